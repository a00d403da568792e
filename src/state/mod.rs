pub mod game;
pub mod registry;
pub mod state_machine;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard, mpsc};
use uuid::Uuid;

use crate::{config::AppConfig, state::game::Song};

pub use self::registry::Registry;

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Handle used to push messages to a connected client channel.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    /// Connection identifier, unique for the process lifetime.
    pub id: Uuid,
    /// Writer-task channel draining into the client's socket.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state: configuration, the read-only song catalogue,
/// the connection registry, and the serialized game registry.
pub struct AppState {
    config: AppConfig,
    catalogue: Vec<Song>,
    clients: DashMap<Uuid, ClientConnection>,
    registry: Mutex<Registry>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, catalogue: Vec<Song>) -> SharedState {
        Arc::new(Self {
            config,
            catalogue,
            clients: DashMap::new(),
            registry: Mutex::new(Registry::default()),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The song catalogue loaded at startup.
    pub fn catalogue(&self) -> &[Song] {
        &self.catalogue
    }

    /// Registry of connected client channels keyed by connection id.
    pub fn clients(&self) -> &DashMap<Uuid, ClientConnection> {
        &self.clients
    }

    /// Acquire the single serialization point for all game-state mutation.
    ///
    /// Handlers and grace timers both funnel through this lock; mutation
    /// sections must not await while holding the guard.
    pub async fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().await
    }
}
