//! In-process [`Connection`] backed by a tokio mpsc channel.
//!
//! Transports that push from a stream (SSE, tests) hold the receiving half and
//! forward whatever arrives. Dropping the receiver is how the peer "closes".

use crate::connection::{Connection, ConnectionId};
use crate::error::{connection_error, ConnectionErrorKind, Error};
use crate::source::Update;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

pub struct ChannelConnection {
    id: ConnectionId,
    sender: Mutex<Option<UnboundedSender<Update>>>,
    closed: CancellationToken,
}

impl ChannelConnection {
    pub fn new() -> (Arc<Self>, UnboundedReceiver<Update>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Arc::new(Self {
            id: ConnectionId::new(),
            sender: Mutex::new(Some(tx)),
            closed: CancellationToken::new(),
        });
        (connection, rx)
    }

    fn sender(&self) -> Option<UnboundedSender<Update>> {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.sender().map_or(true, |tx| tx.is_closed())
    }
}

#[async_trait]
impl Connection for ChannelConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn send(&self, update: &Update) -> Result<(), Error> {
        let tx = self
            .sender()
            .ok_or_else(|| connection_error(ConnectionErrorKind::Closed))?;
        tx.send(update.clone())
            .map_err(|_| connection_error(ConnectionErrorKind::Closed))
    }

    async fn wait_closed(&self) {
        let Some(tx) = self.sender() else {
            return;
        };
        tokio::select! {
            _ = tx.closed() => {}
            _ = self.closed.cancelled() => {}
        }
    }

    async fn close(&self) {
        self.closed.cancel();
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }
}
