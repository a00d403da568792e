//! Application-level configuration loading and the song catalogue.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::state::game::Song;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SONG_SLEUTH_BACK_CONFIG_PATH";
/// Environment variable that overrides the configured host passphrase.
const PASSPHRASE_ENV: &str = "SONG_SLEUTH_BACK_PASSPHRASE";

const DEFAULT_PASSPHRASE: &str = "changeme";
const DEFAULT_HOST_GRACE_SECS: u64 = 30;
const DEFAULT_PLAYER_GRACE_SECS: u64 = 180;
const DEFAULT_CATALOGUE_PATH: &str = "config/catalogue.json";
const DEFAULT_PUBLIC_DIR: &str = "public";
const DEFAULT_AUDIO_DIR: &str = "audio";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Shared secret that grants the host session.
    pub host_passphrase: String,
    /// How long a vanished host may reconnect before the game is torn down.
    pub host_grace: Duration,
    /// How long a vanished player keeps their score and identity.
    pub player_grace: Duration,
    /// Path of the song catalogue JSON file.
    pub catalogue_path: PathBuf,
    /// Directory served as the browser frontend.
    pub public_dir: PathBuf,
    /// Directory holding the audio assets, served under `/audio`.
    pub audio_dir: PathBuf,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in
    /// defaults when the file is absent or malformed.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Ok(passphrase) = env::var(PASSPHRASE_ENV) {
            config.host_passphrase = passphrase;
        }
        if config.host_passphrase == DEFAULT_PASSPHRASE {
            warn!("running with the default host passphrase; set {PASSPHRASE_ENV}");
        }

        config
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host_passphrase: DEFAULT_PASSPHRASE.into(),
            host_grace: Duration::from_secs(DEFAULT_HOST_GRACE_SECS),
            player_grace: Duration::from_secs(DEFAULT_PLAYER_GRACE_SECS),
            catalogue_path: DEFAULT_CATALOGUE_PATH.into(),
            public_dir: DEFAULT_PUBLIC_DIR.into(),
            audio_dir: DEFAULT_AUDIO_DIR.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    host_passphrase: Option<String>,
    host_grace_secs: Option<u64>,
    player_grace_secs: Option<u64>,
    catalogue_path: Option<PathBuf>,
    public_dir: Option<PathBuf>,
    audio_dir: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            host_passphrase: raw.host_passphrase.unwrap_or(defaults.host_passphrase),
            host_grace: raw
                .host_grace_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.host_grace),
            player_grace: raw
                .player_grace_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.player_grace),
            catalogue_path: raw.catalogue_path.unwrap_or(defaults.catalogue_path),
            public_dir: raw.public_dir.unwrap_or(defaults.public_dir),
            audio_dir: raw.audio_dir.unwrap_or(defaults.audio_dir),
        }
    }
}

/// Errors raised while loading the song catalogue at startup.
#[derive(Debug, Error)]
pub enum CatalogueError {
    /// The catalogue file could not be read.
    #[error("reading catalogue `{path}`: {source}")]
    Io {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The catalogue file is not valid JSON for a list of songs.
    #[error("parsing catalogue `{path}`: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// The catalogue parsed but contains no songs.
    #[error("catalogue `{path}` contains no songs")]
    Empty {
        /// Path of the empty catalogue.
        path: PathBuf,
    },
}

/// Load the flat song catalogue (title, artist, file) from JSON.
///
/// An empty catalogue is a configuration error: the game core assumes a song
/// can always be drawn.
pub fn load_catalogue(path: &Path) -> Result<Vec<Song>, CatalogueError> {
    let contents = fs::read_to_string(path).map_err(|source| CatalogueError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let songs: Vec<Song> =
        serde_json::from_str(&contents).map_err(|source| CatalogueError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if songs.is_empty() {
        return Err(CatalogueError::Empty {
            path: path.to_path_buf(),
        });
    }

    info!(path = %path.display(), count = songs.len(), "loaded song catalogue");
    Ok(songs)
}

fn resolve_config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}
