use crate::connection::{Connection, ConnectionId, ConnectionRegistry, UserId};
use crate::dispatch::Dispatcher;
use crate::error::{Error, ErrorKind, HubErrorKind};
use crate::liveness;
use crate::source::UpdateSource;
use chrono::{DateTime, Utc};
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq)]
pub struct HubConfig {
    /// Time between dispatch ticks.
    pub tick_interval: Duration,
    /// Starting watermark. `None` means the time the hub is created.
    pub initial_watermark: Option<DateTime<Utc>>,
    /// Upper bound on a single write to one connection.
    pub write_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            initial_watermark: None,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// Entry point for accepting connections and running the dispatch loop.
pub struct Hub {
    registry: Arc<ConnectionRegistry>,
    dispatcher: Mutex<Option<Dispatcher>>,
    closing: AtomicBool,
}

impl Hub {
    pub fn new(source: Arc<dyn UpdateSource>, config: HubConfig) -> Self {
        Self::with_registry(Arc::new(ConnectionRegistry::new()), source, config)
    }

    pub fn with_registry(
        registry: Arc<ConnectionRegistry>,
        source: Arc<dyn UpdateSource>,
        mut config: HubConfig,
    ) -> Self {
        config.initial_watermark.get_or_insert_with(Utc::now);
        let dispatcher = Dispatcher::new(Arc::clone(&registry), source, &config);
        Self {
            registry,
            dispatcher: Mutex::new(Some(dispatcher)),
            closing: AtomicBool::new(false),
        }
    }

    /// Register an accepted connection and start its liveness detector.
    ///
    /// Must be called from within a tokio runtime. A duplicate connection or an
    /// empty user id is a bug in the accept path and is returned unchanged.
    /// Once `close_all` has started, new connections fail with
    /// `HubErrorKind::ShuttingDown`.
    pub fn add_connection(
        &self,
        user_id: UserId,
        connection: Arc<dyn Connection>,
    ) -> Result<ConnectionId, Error> {
        if self.is_closing() {
            return Err(Error::new(ErrorKind::Hub(HubErrorKind::ShuttingDown)));
        }

        let connection_id = connection.id().clone();
        self.registry
            .insert(Arc::clone(&connection), user_id.clone())?;

        // close_all may have scanned the registry between the check and the insert
        if self.is_closing() {
            self.registry.remove(&connection_id);
            tokio::spawn(async move { connection.close().await });
            warn!("Rejected connection {connection_id} for user {user_id}: hub is shutting down");
            return Err(Error::new(ErrorKind::Hub(HubErrorKind::ShuttingDown)));
        }
        liveness::spawn(Arc::clone(&self.registry), connection);

        info!("Registered connection {connection_id} for user {user_id}");
        Ok(connection_id)
    }

    /// Drive the dispatch loop until `cancel` fires.
    ///
    /// Only one call per hub may run the loop; later calls fail with
    /// `HubErrorKind::AlreadyRunning`. Live connections are left open on return.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), Error> {
        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or_else(|| Error::new(ErrorKind::Hub(HubErrorKind::AlreadyRunning)))?;

        dispatcher.run(cancel).await;
        Ok(())
    }

    /// Close and unregister every open connection, returning how many were closed.
    ///
    /// Not called by `run`; this is for the owning process's shutdown sequence.
    /// The hub accepts no further connections afterwards.
    pub async fn close_all(&self) -> usize {
        self.closing.store(true, Ordering::SeqCst);
        let mut closed = 0;
        for entry in self.registry.entries() {
            entry.connection.close().await;
            if self.registry.remove(&entry.connection_id) {
                closed += 1;
            }
        }
        info!("Closed {closed} open connection(s)");
        closed
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_registered(&self, connection_id: &ConnectionId) -> bool {
        self.registry.contains(connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConnection;
    use crate::error::RegistryErrorKind;
    use crate::source::{MemoryUpdateSource, Update};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::oneshot;

    fn hub(source: Arc<dyn UpdateSource>) -> Arc<Hub> {
        Arc::new(Hub::new(
            source,
            HubConfig {
                initial_watermark: Some(Utc::now() - chrono::Duration::seconds(60)),
                ..HubConfig::default()
            },
        ))
    }

    /// Signals when queried, then never answers.
    struct StalledSource {
        started: Mutex<Option<oneshot::Sender<()>>>,
    }

    #[async_trait]
    impl UpdateSource for StalledSource {
        async fn get_update(
            &self,
            _user_id: &UserId,
            _since: DateTime<Utc>,
        ) -> Result<Option<Update>, Error> {
            let started = self.started.lock().unwrap().take();
            if let Some(started) = started {
                let _ = started.send(());
            }
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_add_connection_rejects_same_handle_twice() {
        let hub = hub(Arc::new(MemoryUpdateSource::new()));
        let (connection, _rx) = ChannelConnection::new();

        let id = hub
            .add_connection("u1".to_string(), connection.clone())
            .unwrap();
        let err = hub
            .add_connection("u1".to_string(), connection.clone())
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            ErrorKind::Registry(RegistryErrorKind::DuplicateConnection)
        );
        assert!(hub.is_registered(&id));
        assert_eq!(hub.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_peer_disconnect_unregisters_connection() {
        let hub = hub(Arc::new(MemoryUpdateSource::new()));
        let (connection, rx) = ChannelConnection::new();
        let id = hub.add_connection("u1".to_string(), connection).unwrap();

        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), async {
            while hub.is_registered(&id) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("liveness detector should unregister the connection");
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_delivers_updates_on_each_interval() {
        let source = Arc::new(MemoryUpdateSource::new());
        let hub = hub(source.clone());
        let (connection, mut rx) = ChannelConnection::new();
        hub.add_connection("u1".to_string(), connection).unwrap();
        source.publish("u1".to_string(), json!({"actor": 42}));

        let cancel = CancellationToken::new();
        let runner = {
            let hub = Arc::clone(&hub);
            let cancel = cancel.clone();
            tokio::spawn(async move { hub.run(cancel).await })
        };

        let update = tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("update should arrive within a few ticks")
            .expect("channel open");
        assert_eq!(update.payload, json!({"actor": 42}));

        cancel.cancel();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_close_all_ends_every_stream() {
        let hub = hub(Arc::new(MemoryUpdateSource::new()));
        let (first, mut first_rx) = ChannelConnection::new();
        let (second, mut second_rx) = ChannelConnection::new();
        hub.add_connection("u1".to_string(), first).unwrap();
        hub.add_connection("u2".to_string(), second).unwrap();

        assert_eq!(hub.close_all().await, 2);
        assert_eq!(hub.connection_count(), 0);
        assert!(first_rx.recv().await.is_none());
        assert!(second_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_add_connection_after_close_all_is_rejected() {
        let hub = hub(Arc::new(MemoryUpdateSource::new()));
        assert_eq!(hub.close_all().await, 0);
        assert!(hub.is_closing());

        let (connection, _rx) = ChannelConnection::new();
        let err = hub
            .add_connection("u1".to_string(), connection.clone())
            .unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::Hub(HubErrorKind::ShuttingDown));
        assert!(!hub.is_registered(connection.id()));
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_run_only_once() {
        let hub = hub(Arc::new(MemoryUpdateSource::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        hub.run(cancel.clone()).await.unwrap();
        let err = hub.run(cancel).await.unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Hub(HubErrorKind::AlreadyRunning));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_mid_tick_returns() {
        let (started_tx, started_rx) = oneshot::channel();
        let hub = hub(Arc::new(StalledSource {
            started: Mutex::new(Some(started_tx)),
        }));
        let (connection, _rx) = ChannelConnection::new();
        hub.add_connection("u1".to_string(), connection).unwrap();

        let cancel = CancellationToken::new();
        let runner = {
            let hub = Arc::clone(&hub);
            let cancel = cancel.clone();
            tokio::spawn(async move { hub.run(cancel).await })
        };

        started_rx.await.expect("tick should query the source");
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .expect("run should return promptly after cancellation");
        assert!(result.unwrap().is_ok());
        assert_eq!(hub.connection_count(), 1, "cancellation leaves connections open");
    }
}
