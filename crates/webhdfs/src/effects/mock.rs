//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use futures_util::{StreamExt, stream};
use url::Url;

use super::http::{BoxStream, HttpClient, HttpRequest, HttpResponse, RequestBody};
use crate::data::Method;
use crate::error::TransportError;

/// What the fake server does with the next request.
pub(crate) enum Reply {
    Fail(TransportError),
    /// Never answer.
    Stall,
    Respond {
        status:   u16,
        location: Option<String>,
        chunks:   Vec<Result<Bytes, TransportError>>,
        /// Keep the body open after the chunks; the flag flips once the body is dropped.
        hang:     Option<Arc<AtomicBool>>,
    },
}

impl Reply {
    pub(crate) fn status(status: u16) -> Self {
        Reply::Respond {
            status,
            location: None,
            chunks: Vec::new(),
            hang: None,
        }
    }

    pub(crate) fn body(status: u16, body: &str) -> Self {
        Reply::status(status).chunk(body.as_bytes())
    }

    pub(crate) fn redirect(location: &str) -> Self {
        let mut reply = Reply::status(307);
        if let Reply::Respond { location: ref mut l, .. } = reply {
            *l = Some(location.to_string());
        }
        reply
    }

    pub(crate) fn refused() -> Self { Reply::Fail(TransportError::connection_refused("connection refused")) }

    pub(crate) fn standby() -> Self {
        Reply::body(
            403,
            r#"{"RemoteException":{"exception":"StandbyException","javaClassName":"org.apache.hadoop.ipc.StandbyException","message":"Operation category READ is not supported in state standby"}}"#,
        )
    }

    pub(crate) fn chunk(mut self, data: &[u8]) -> Self {
        if let Reply::Respond { ref mut chunks, .. } = self {
            chunks.push(Ok(Bytes::copy_from_slice(data)));
        }
        self
    }

    pub(crate) fn broken(mut self, message: &str) -> Self {
        if let Reply::Respond { ref mut chunks, .. } = self {
            chunks.push(Err(TransportError::other(message)));
        }
        self
    }

    pub(crate) fn hang(mut self, dropped: Arc<AtomicBool>) -> Self {
        if let Reply::Respond { ref mut hang, .. } = self {
            *hang = Some(dropped);
        }
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method:  Method,
    pub url:     Url,
    pub headers: Vec<(String, String)>,
    pub body:    Option<Vec<u8>>,
}

impl Recorded {
    pub(crate) fn query(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) { self.0.store(true, Ordering::SeqCst); }
}

/// Answers requests from a script, in order, and records what it was sent.
///
/// Streaming request bodies are read to the end before the reply is produced.
pub(crate) struct MockHttpClient {
    script:   Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockHttpClient {
    pub(crate) fn new(script: Vec<Reply>) -> Self {
        Self {
            script:   Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<Recorded> { self.requests.lock().unwrap().clone() }
}

impl HttpClient for MockHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let body = match request.body {
            RequestBody::Empty => None,
            RequestBody::Stream(mut stream) => {
                let mut data = Vec::new();
                while let Some(chunk) = stream.next().await {
                    data.extend_from_slice(&chunk?);
                }
                Some(data)
            }
        };
        self.requests.lock().unwrap().push(Recorded {
            method: request.method,
            url: request.url,
            headers: request.headers,
            body,
        });

        let reply = self.script.lock().unwrap().pop_front();
        match reply.unwrap_or_else(|| panic!("unscripted request")) {
            Reply::Fail(e) => Err(e),
            Reply::Stall => futures_util::future::pending().await,
            Reply::Respond {
                status,
                location,
                chunks,
                hang,
            } => {
                let head = stream::iter(chunks);
                let body: BoxStream<'static, Result<Bytes, TransportError>> = match hang {
                    Some(dropped) => {
                        let guard = DropFlag(dropped);
                        Box::pin(head.chain(stream::pending()).map(move |chunk| {
                            let _ = &guard;
                            chunk
                        }))
                    }
                    None => Box::pin(head),
                };
                Ok(HttpResponse { status, location, body })
            }
        }
    }
}
