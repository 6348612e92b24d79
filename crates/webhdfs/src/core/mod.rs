//! Pure logic for talking to WebHDFS.
//!
//! Nothing in this module performs I/O: URLs are built, responses are
//! categorized and failover decisions are made here, and the effects layer acts
//! on the results.

mod classify;
mod endpoint;
mod failover;

pub use classify::{
    Classification, ENDPOINT_NOT_FOUND_MESSAGE, ResponseClass, UNKNOWN_ERROR_MESSAGE, classify,
    classify_status, is_error, is_redirect, is_success, parse_remote_error, remote_error_for_status,
};
pub use endpoint::{build_url, validate_path};
pub use failover::{Attempt, Failover, FailureSignal, HostRotator, Verdict, decide};
