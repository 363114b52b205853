//! Error types for the `hub` crate.
//!
//! Follows the same pattern as the rest of the workspace: a root `Error` struct
//! holding an error kind tree plus an optional source for chaining.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors raised by the hub or its collaborators.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Registry(RegistryErrorKind),
    Connection(ConnectionErrorKind),
    Source(SourceErrorKind),
    Hub(HubErrorKind),
}

/// Contract violations by the caller registering a connection.
#[derive(Debug, PartialEq)]
pub enum RegistryErrorKind {
    DuplicateConnection,
    InvalidUser,
}

/// Failures writing to, or reading from, a single client connection.
#[derive(Debug, PartialEq)]
pub enum ConnectionErrorKind {
    Closed,
    Timeout,
    Transport,
}

/// Failures fetching updates from the update source.
#[derive(Debug, PartialEq)]
pub enum SourceErrorKind {
    Unavailable,
}

#[derive(Debug, PartialEq)]
pub enum HubErrorKind {
    AlreadyRunning,
    ShuttingDown,
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Self {
            source: None,
            error_kind,
        }
    }

    pub fn with_source(mut self, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Registry(kind) => write!(f, "Registry error: {kind:?}"),
            ErrorKind::Connection(kind) => write!(f, "Connection error: {kind:?}"),
            ErrorKind::Source(kind) => write!(f, "Update source error: {kind:?}"),
            ErrorKind::Hub(kind) => write!(f, "Hub error: {kind:?}"),
        }?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Error::new(ErrorKind::Connection(ConnectionErrorKind::Timeout)).with_source(err)
    }
}

pub fn registry_error(kind: RegistryErrorKind) -> Error {
    Error::new(ErrorKind::Registry(kind))
}

pub fn connection_error(kind: ConnectionErrorKind) -> Error {
    Error::new(ErrorKind::Connection(kind))
}

pub fn source_error(kind: SourceErrorKind) -> Error {
    Error::new(ErrorKind::Source(kind))
}
