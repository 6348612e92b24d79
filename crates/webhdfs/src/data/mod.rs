//! Immutable data types: configuration, per-operation options, progress and wire messages.

pub mod config;
pub mod message;
pub mod operation;
pub mod options;
pub mod progress;

pub use config::{ClientConfig, ErrorSchema, Scheme, Timeouts};
pub use message::{FileStatus, FileType};
pub use operation::{Method, Operation, Params};
pub use options::{MkdirOptions, OpenOptions, WriteOptions};
pub use progress::{Progress, ProgressCallback, TransferPhase};
