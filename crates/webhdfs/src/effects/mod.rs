//! I/O: the HTTP transport, the one-shot request path, the streaming transfer
//! pipelines and the client facade built on them.

mod client;
mod download;
mod http;
#[cfg(test)]
mod mock;
mod request;
mod upload;

pub use client::WebHdfsClient;
pub use download::Download;
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use http::{BodySender, BodyStream, BoxStream, HttpClient, HttpRequest, HttpResponse, RequestBody};
pub use upload::{Upload, UploadOutcome};
