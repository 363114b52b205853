use crate::extractors::trusted_user::TrustedUser;
use crate::{AppState, Error};
use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use hub::ChannelConnection;
use log::*;
use std::convert::Infallible;

/// SSE event name carried by every pushed update.
pub(crate) const UPDATE_EVENT: &str = "update";

/// SSE handler that hands a long-lived connection to the hub.
/// The stream ends when the client disconnects or the hub closes the connection.
pub(crate) async fn sse_handler(
    TrustedUser(user_id): TrustedUser,
    State(app_state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Error> {
    debug!("Establishing SSE connection for user {user_id}");

    let (connection, mut rx) = ChannelConnection::new();
    let connection_id = app_state.hub.add_connection(user_id, connection)?;

    // Dropping `rx` when the client goes away is what the liveness detector waits on
    let stream = stream! {
        while let Some(update) = rx.recv().await {
            match Event::default().event(UPDATE_EVENT).json_data(&update) {
                Ok(event) => yield Ok::<_, Infallible>(event),
                Err(e) => error!("Failed to serialize update for connection {connection_id}: {e}"),
            }
        }

        debug!("SSE connection {connection_id} closed by the hub");
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
