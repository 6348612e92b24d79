use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::data::Method;
use crate::data::progress::ProgressTracker;
use crate::error::TransportError;

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Producer half of a [`BodyStream`].
///
/// The body only ends cleanly after [`BodySender::seal`]; if the sender is dropped
/// unsealed, the stream yields an error so the peer never mistakes a truncated
/// body for a complete one.
#[derive(Debug)]
pub struct BodySender {
    tx:     mpsc::Sender<io::Result<Bytes>>,
    sealed: Arc<AtomicBool>,
}

impl BodySender {
    /// Queue a chunk, waiting while the channel is full.
    ///
    /// Fails once the consuming request is gone.
    pub async fn send(&self, chunk: io::Result<Bytes>) -> Result<(), mpsc::error::SendError<io::Result<Bytes>>> {
        self.tx.send(chunk).await
    }

    /// Mark the body complete and close it.
    pub fn seal(self) { self.sealed.store(true, Ordering::Release); }
}

/// Streaming request body fed through a bounded channel.
///
/// The transport pulls chunks as it writes them to the socket, so a slow or
/// not-yet-connected peer applies backpressure to the producer.
pub struct BodyStream {
    rx:       mpsc::Receiver<io::Result<Bytes>>,
    sealed:   Arc<AtomicBool>,
    ended:    bool,
    progress: Option<Arc<Mutex<ProgressTracker>>>,
    finished: Option<oneshot::Sender<()>>,
}

impl BodyStream {
    pub fn channel(depth: usize) -> (BodySender, Self) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let sealed = Arc::new(AtomicBool::new(false));
        let sender = BodySender {
            tx,
            sealed: Arc::clone(&sealed),
        };
        let body = Self {
            rx,
            sealed,
            ended: false,
            progress: None,
            finished: None,
        };
        (sender, body)
    }

    pub(crate) fn with_progress(mut self, progress: Arc<Mutex<ProgressTracker>>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Resolves once the transport has pulled the last item of the body, or dropped it.
    pub(crate) fn finished(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.finished = Some(tx);
        rx
    }

    fn end(&mut self) {
        self.ended = true;
        if let Some(finished) = self.finished.take() {
            let _ = finished.send(());
        }
    }
}

impl Stream for BodyStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.ended {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if let Some(progress) = &this.progress {
                    progress
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .add_bytes(chunk.len() as u64);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.end();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.end();
                if this.sealed.load(Ordering::Acquire) {
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "upload body ended before it was finished",
                    ))))
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

pub enum RequestBody {
    Empty,
    Stream(BodyStream),
}

/// A single HTTP exchange as seen by the pipelines.
pub struct HttpRequest {
    pub method:  Method,
    pub url:     Url,
    pub headers: Vec<(String, String)>,
    pub body:    RequestBody,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("streaming_body", &matches!(self.body, RequestBody::Stream(_)))
            .finish()
    }
}

/// Response head plus a lazily consumed body.
///
/// Dropping the body before it ends releases the underlying connection.
pub struct HttpResponse {
    pub status:   u16,
    pub location: Option<String>,
    pub body:     BoxStream<'static, Result<Bytes, TransportError>>,
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Asynchronous HTTP client abstraction.
///
/// Implementations must not follow redirects on their own: the transfer
/// pipelines need to see the 301/307 from the namenode to route the payload to
/// the datanode.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - Scripted mocks for testing
pub trait HttpClient: Send + Sync + 'static {
    /// Send a request and return as soon as the response head is available.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if no response was received. HTTP error
    /// statuses are not errors at this level.
    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::error::Error as _;

    use futures_util::StreamExt;

    use super::*;
    use crate::data::ClientConfig;
    use crate::error::{Error, Result, TransportErrorKind};

    /// Production HTTP client implementation using reqwest.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        /// Create a new ReqwestClient with default configuration.
        pub fn new() -> Result<Self> { Self::from_config(&ClientConfig::default()) }

        /// Build a client honoring the connect timeout and keep-alive policy of `config`.
        pub fn from_config(config: &ClientConfig) -> Result<Self> {
            let mut builder = reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .connect_timeout(config.timeouts.connect);
            if !config.keep_alive {
                builder = builder.pool_max_idle_per_host(0);
            }

            let client = builder
                .build()
                .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
            Ok(Self { client })
        }
    }

    impl HttpClient for ReqwestClient {
        async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            let method = match request.method {
                Method::Get => reqwest::Method::GET,
                Method::Put => reqwest::Method::PUT,
                Method::Post => reqwest::Method::POST,
                Method::Delete => reqwest::Method::DELETE,
            };

            let mut builder = self.client.request(method, request.url);
            for (key, value) in &request.headers {
                builder = builder.header(key.as_str(), value.as_str());
            }
            if let RequestBody::Stream(body) = request.body {
                builder = builder.body(reqwest::Body::wrap_stream(body));
            }

            let response = builder.send().await.map_err(transport_error)?;
            let status = response.status().as_u16();
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.bytes_stream().map(|chunk| chunk.map_err(transport_error));

            Ok(HttpResponse {
                status,
                location,
                body: Box::pin(body),
            })
        }
    }

    /// Walk the source chain: reqwest wraps the socket error a few layers deep.
    fn transport_error(e: reqwest::Error) -> TransportError {
        let mut source = e.source();
        while let Some(cause) = source {
            if let Some(io) = cause.downcast_ref::<io::Error>()
                && io.kind() == io::ErrorKind::ConnectionRefused
            {
                return TransportError::new(TransportErrorKind::ConnectionRefused, e.to_string());
            }
            source = cause.source();
        }

        let kind = if e.is_timeout() {
            TransportErrorKind::Timeout
        } else {
            TransportErrorKind::Other
        };
        TransportError::new(kind, e.to_string())
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::data::Progress;

    #[tokio::test]
    async fn test_body_stream_yields_in_order_and_ends() {
        let (tx, mut body) = BodyStream::channel(4);
        tx.send(Ok(Bytes::from_static(b"random "))).await.unwrap();
        tx.send(Ok(Bytes::from_static(b"data"))).await.unwrap();
        tx.seal();

        assert_eq!(body.next().await.unwrap().unwrap(), Bytes::from_static(b"random "));
        assert_eq!(body.next().await.unwrap().unwrap(), Bytes::from_static(b"data"));
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_body_stream_signals_when_finished() {
        let (tx, mut body) = BodyStream::channel(4);
        let mut finished = body.finished();
        tx.send(Ok(Bytes::from_static(b"data"))).await.unwrap();

        assert!(body.next().await.unwrap().is_ok());
        assert!(finished.try_recv().is_err());

        tx.seal();
        assert!(body.next().await.is_none());
        assert!(finished.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_body_stream_unsealed_drop_is_an_error() {
        let (tx, mut body) = BodyStream::channel(4);
        tx.send(Ok(Bytes::from_static(b"partial"))).await.unwrap();
        drop(tx);

        assert!(body.next().await.unwrap().is_ok());
        let err = body.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_body_stream_stops_after_error() {
        let (tx, mut body) = BodyStream::channel(4);
        tx.send(Err(io::Error::other("source failed"))).await.unwrap();
        tx.send(Ok(Bytes::from_static(b"late"))).await.unwrap();
        tx.seal();

        assert!(body.next().await.unwrap().is_err());
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_body_stream_counts_bytes() {
        let seen = Arc::new(Mutex::new(0u64));
        let sink = Arc::clone(&seen);
        let tracker = Arc::new(Mutex::new(ProgressTracker::new(Some(Arc::new(
            move |p: &Progress| *sink.lock().unwrap() = p.bytes_transferred,
        )))));

        let (tx, body) = BodyStream::channel(2);
        let mut body = body.with_progress(tracker);
        tx.send(Ok(Bytes::from_static(b"12345"))).await.unwrap();
        tx.send(Ok(Bytes::from_static(b"678"))).await.unwrap();
        tx.seal();

        while body.next().await.is_some() {}
        assert_eq!(*seen.lock().unwrap(), 8);
    }

    #[test]
    fn test_request_debug_omits_body() {
        let request = HttpRequest {
            method:  Method::Put,
            url:     Url::parse("http://nn1:50070/webhdfs/v1/a?op=CREATE").unwrap(),
            headers: vec![("X-My-Custom-Header".to_string(), "Kerberos".to_string())],
            body:    RequestBody::Empty,
        };
        let debug = format!("{request:?}");
        assert!(debug.contains("op=CREATE"));
        assert!(debug.contains("streaming_body: false"));
    }
}
