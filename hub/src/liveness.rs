use crate::connection::{Connection, ConnectionRegistry};
use log::*;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Spawn the liveness detector for one accepted connection.
///
/// The task blocks until the peer closes, errors or sends anything, then closes
/// the connection and removes it from the registry. It is never cancelled; it
/// ends on its own when the connection does.
pub fn spawn(registry: Arc<ConnectionRegistry>, connection: Arc<dyn Connection>) -> JoinHandle<()> {
    tokio::spawn(async move {
        connection.wait_closed().await;
        connection.close().await;

        let connection_id = connection.id();
        if registry.remove(connection_id) {
            debug!("Connection {connection_id} closed by peer, unregistered");
        } else {
            trace!("Connection {connection_id} closed, already unregistered");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConnection;
    use std::time::Duration;

    #[tokio::test]
    async fn test_detector_removes_connection_when_peer_disconnects() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (connection, rx) = ChannelConnection::new();
        let (other, _other_rx) = ChannelConnection::new();
        registry.insert(connection.clone(), "u1".to_string()).unwrap();
        registry.insert(other.clone(), "u2".to_string()).unwrap();

        let detector = spawn(Arc::clone(&registry), connection.clone());
        let _other_detector = spawn(Arc::clone(&registry), other.clone());
        drop(rx);

        tokio::time::timeout(Duration::from_secs(1), detector)
            .await
            .expect("detector should finish after the peer disconnects")
            .unwrap();

        assert!(!registry.contains(connection.id()));
        assert!(registry.contains(other.id()));
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_detector_tolerates_prior_removal() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (connection, _rx) = ChannelConnection::new();
        registry.insert(connection.clone(), "u1".to_string()).unwrap();

        let detector = spawn(Arc::clone(&registry), connection.clone());
        registry.remove(connection.id());
        connection.close().await;

        tokio::time::timeout(Duration::from_secs(1), detector)
            .await
            .expect("detector should finish after close")
            .unwrap();
        assert!(registry.is_empty());
    }
}
