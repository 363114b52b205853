//! Real-time update dispatch hub.
//!
//! Keeps a registry of open, long-lived client connections and pushes each
//! user's latest change to their connection on a fixed interval.
//!
//! # Architecture
//!
//! - **Connection registry**: a sharded `DashMap` from `ConnectionId` to the
//!   user it belongs to. Inserts, removals and scans run concurrently from the
//!   accept path, the liveness detectors and the dispatch loop.
//! - **Liveness detector**: one tokio task per connection that waits for the
//!   peer to go away, then closes and unregisters it. This is the only way
//!   client-initiated disconnects are discovered.
//! - **Dispatch loop**: a single task that ticks every `tick_interval`, asks the
//!   `UpdateSource` for each registered user's newest update since the
//!   watermark, and writes hits to the connection. Write failures close and
//!   unregister that one connection; source failures count as "no update".
//! - **Best effort**: delivery is at-least-once with no ordering across users
//!   and no persistence. A client that drops simply reconnects.
//!
//! # Flow
//!
//! 1. The acceptor authenticates the client and calls `Hub::add_connection`
//! 2. The connection is registered and its liveness detector spawned
//! 3. Each tick captures the watermark and the current time, scans the
//!    registry and delivers updates
//! 4. The watermark moves to the time captured at the start of the tick
//! 5. `Hub::run` returns once its `CancellationToken` is cancelled
//!
//! # Example
//!
//! ```rust,ignore
//! let source = Arc::new(MemoryUpdateSource::new());
//! let hub = Arc::new(Hub::new(source.clone(), HubConfig::default()));
//!
//! let (connection, mut rx) = ChannelConnection::new();
//! hub.add_connection(user_id, connection)?;
//!
//! let cancel = CancellationToken::new();
//! tokio::spawn({
//!     let hub = hub.clone();
//!     let cancel = cancel.clone();
//!     async move { hub.run(cancel).await }
//! });
//! ```

pub mod channel;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod liveness;
pub mod source;

pub use channel::ChannelConnection;
pub use connection::{Connection, ConnectionId, ConnectionRegistry, UserId};
pub use error::Error;
pub use hub::{Hub, HubConfig};
pub use source::{MemoryUpdateSource, Update, UpdateSource};
pub use tokio_util::sync::CancellationToken;
