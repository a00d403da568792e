//! The process-wide single-host gate.

use tracing::info;
use uuid::Uuid;

use crate::{
    dto::ws::ServerMessage,
    error::ServiceError,
    services::room_events,
    state::SharedState,
};

/// Claim the host session with the shared passphrase.
///
/// On success every connected channel learns that hosting is now taken;
/// a wrong passphrase, or a session already bound to another connection,
/// is rejected to the caller only.
pub async fn submit_passphrase(
    state: &SharedState,
    connection_id: Uuid,
    passphrase: &str,
) -> Result<(), ServiceError> {
    if passphrase != state.config().host_passphrase {
        return Err(ServiceError::Unauthorized);
    }

    let mut registry = state.registry().await;
    registry.session.claim(connection_id)?;

    info!(connection = %connection_id, "host session claimed");
    room_events::broadcast_all(state, &ServerMessage::SessionStatus { active: true });
    Ok(())
}

/// Release the host session. Only the bound connection may release; any
/// other caller is a no-op.
pub async fn release_session(state: &SharedState, connection_id: Uuid) {
    let mut registry = state.registry().await;
    if registry.session.holder != Some(connection_id) {
        return;
    }

    registry.session.release();
    info!(connection = %connection_id, "host session released");
    room_events::broadcast_all(state, &ServerMessage::SessionStatus { active: false });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{connect_client, drain, test_state};

    #[tokio::test]
    async fn wrong_passphrase_is_rejected() {
        let state = test_state();
        let (host, _rx) = connect_client(&state);

        let err = submit_passphrase(&state, host, "wrong").await.unwrap_err();
        assert_eq!(err, ServiceError::Unauthorized);
        assert!(!state.registry().await.session.is_active());
    }

    #[tokio::test]
    async fn claim_broadcasts_to_every_channel() {
        let state = test_state();
        let (host, mut host_rx) = connect_client(&state);
        let (bystander, mut bystander_rx) = connect_client(&state);

        submit_passphrase(&state, host, "open-sesame").await.unwrap();

        assert_eq!(state.registry().await.session.holder, Some(host));
        for rx in [&mut host_rx, &mut bystander_rx] {
            let events = drain(rx);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0]["type"], "session_status");
            assert_eq!(events[0]["active"], true);
        }
        let _ = bystander;
    }

    #[tokio::test]
    async fn second_claimant_is_rejected_while_held() {
        let state = test_state();
        let (first, _rx1) = connect_client(&state);
        let (second, _rx2) = connect_client(&state);

        submit_passphrase(&state, first, "open-sesame").await.unwrap();
        let err = submit_passphrase(&state, second, "open-sesame")
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Unauthorized);
        assert_eq!(state.registry().await.session.holder, Some(first));
    }

    #[tokio::test]
    async fn release_by_non_holder_is_a_no_op() {
        let state = test_state();
        let (holder, _rx1) = connect_client(&state);
        let (other, mut other_rx) = connect_client(&state);

        submit_passphrase(&state, holder, "open-sesame").await.unwrap();
        drain(&mut other_rx);

        release_session(&state, other).await;
        assert_eq!(state.registry().await.session.holder, Some(holder));
        assert!(drain(&mut other_rx).is_empty());

        release_session(&state, holder).await;
        assert!(!state.registry().await.session.is_active());
        let events = drain(&mut other_rx);
        assert_eq!(events[0]["active"], false);
    }
}
