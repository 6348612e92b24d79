//! Streaming WebHDFS client with namenode failover.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - `data` - Immutable configuration, per-operation options and wire messages
//! - [`core`] - Pure logic: endpoint URLs, response classification, failover policy
//! - `effects` - I/O operations with trait abstraction
//!
//! # Key Features
//!
//! - **Two-Hop Streaming**: Uploads hold the payload back until the namenode names a
//!   datanode, then stream it there; downloads follow the redirect and forward chunks
//!   as they arrive
//! - **Namenode Failover**: A refused connection or a standby answer moves to the next
//!   configured namenode, at most once per operation
//! - **Exactly-Once Outcome**: Every transfer ends in a single completion or failure

pub mod core;
mod data;
mod effects;
mod error;

pub use data::{
    ClientConfig, ErrorSchema, FileStatus, FileType, Method, MkdirOptions, OpenOptions, Operation, Params,
    Progress, ProgressCallback, Scheme, Timeouts, TransferPhase, WriteOptions,
};
pub use effects::{
    BodySender, BodyStream, BoxStream, Download, HttpClient, HttpRequest, HttpResponse, RequestBody, Upload,
    UploadOutcome, WebHdfsClient,
};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;

pub use error::{
    Error, NO_ACTIVE_NAMENODE_EXCEPTION, RemoteError, Result, STANDBY_EXCEPTION, TransportError,
    TransportErrorKind,
};
