//! Error types for webhdfs.

use std::fmt;
use std::io;

use thiserror::Error;

/// Exception kind reported by a namenode running in standby mode.
pub const STANDBY_EXCEPTION: &str = "StandbyException";

/// Exception kind surfaced once every configured namenode has been tried.
pub const NO_ACTIVE_NAMENODE_EXCEPTION: &str = "NoActiveNamenodeException";

/// Error reported by the remote side, usually decoded from a `RemoteException` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub message:         String,
    pub exception:       Option<String>,
    pub java_class_name: Option<String>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message:         message.into(),
            exception:       None,
            java_class_name: None,
        }
    }

    #[must_use]
    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// Returns `true` if the namenode answered as an HA standby.
    pub fn is_standby(&self) -> bool { self.exception.as_deref() == Some(STANDBY_EXCEPTION) }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.exception {
            Some(exception) => write!(f, "{exception}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Coarse category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The host actively refused the connection.
    ConnectionRefused,
    /// The transport gave up waiting.
    Timeout,
    /// Anything else: DNS, TLS, a connection dropped mid-body, ...
    Other,
}

/// Failure below the HTTP layer: the request never produced a response, or its body broke off.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind:    TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection_refused(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::ConnectionRefused, message)
    }

    pub fn other(message: impl Into<String>) -> Self { Self::new(TransportErrorKind::Other, message) }

    pub fn is_connection_refused(&self) -> bool { self.kind == TransportErrorKind::ConnectionRefused }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        let kind = match e.kind() {
            io::ErrorKind::ConnectionRefused => TransportErrorKind::ConnectionRefused,
            io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            _ => TransportErrorKind::Other,
        };
        Self::new(kind, e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("remote error: {0}")]
    Remote(RemoteError),

    #[error("no active namenode found after trying {attempts} host(s)")]
    NoActiveNamenode {
        attempts: usize,
        #[source]
        last:     Box<Error>,
    },

    #[error("unexpected response: HTTP {status} ({context})")]
    UnexpectedResponse { status: u16, context: &'static str },

    #[error("invalid response body: {0}")]
    InvalidResponse(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("upload is no longer accepting data")]
    UploadClosed,

    #[error("transfer aborted")]
    Aborted,

    #[error("failed to read config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// The remote exception kind carried by this error, if any.
    pub fn exception(&self) -> Option<&str> {
        match self {
            Error::Remote(remote) => remote.exception.as_deref(),
            Error::NoActiveNamenode { .. } => Some(NO_ACTIVE_NAMENODE_EXCEPTION),
            _ => None,
        }
    }

    /// The decoded remote error, if this failure came from the server.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Error::Remote(remote) => Some(remote),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.exception(),
            Some("FileNotFoundException") | Some("PathNotFoundException")
        )
    }
}

impl From<RemoteError> for Error {
    fn from(e: RemoteError) -> Self { Error::Remote(e) }
}

pub type Result<T> = std::result::Result<T, Error>;
