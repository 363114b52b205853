use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::*;

use hub::error::{ConnectionErrorKind, Error as HubError, ErrorKind, HubErrorKind, SourceErrorKind};

#[derive(Debug)]
pub struct Error(HubError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{}", self.0)
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match &self.0.error_kind {
            // A rejected registration is a bug in the accept path, not the client's fault
            ErrorKind::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Connection(connection_error_kind) => match connection_error_kind {
                ConnectionErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ConnectionErrorKind::Closed | ConnectionErrorKind::Transport => {
                    StatusCode::BAD_GATEWAY
                }
            },
            ErrorKind::Source(SourceErrorKind::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Hub(HubErrorKind::AlreadyRunning) => StatusCode::CONFLICT,
            ErrorKind::Hub(HubErrorKind::ShuttingDown) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{self}");
        }
        let reason = status.canonical_reason().unwrap_or("ERROR").to_uppercase();
        (status, reason).into_response()
    }
}

impl From<HubError> for Error {
    fn from(err: HubError) -> Self {
        Self(err)
    }
}
