//! Streaming download.
//!
//! A spawned task walks the namenode → datanode hops, applies the failover
//! policy before any payload byte is delivered, and forwards chunks over a
//! bounded channel. The channel carries at most one `Err`, and nothing follows it.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::http::{HttpClient, HttpResponse, RequestBody};
use super::request::{Shared, next_chunk};
use crate::core::{Attempt, Failover, ResponseClass, classify_status, validate_path};
use crate::data::progress::ProgressTracker;
use crate::data::{Method, OpenOptions, Operation, TransferPhase};
use crate::error::{Error, Result};

const CHUNK_QUEUE_DEPTH: usize = 8;

/// Read half of an in-flight download.
///
/// Yields the file's bytes in arrival order and ends after the last chunk. A
/// failure is yielded once as the final item. Dropping the stream, or calling
/// [`Download::cancel`], releases the datanode connection.
#[derive(Debug)]
pub struct Download {
    rx: mpsc::Receiver<Result<Bytes>>,
}

impl Download {
    /// Stop the transfer. No further chunk or completion is delivered.
    pub fn cancel(mut self) { self.rx.close(); }

    /// Collect the whole file into memory.
    pub async fn read_to_end(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.rx.recv().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Copy the file into `writer` and return the number of bytes written.
    pub async fn copy_to<W>(mut self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut total = 0u64;
        while let Some(chunk) = self.rx.recv().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await?;
            total += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok(total)
    }
}

impl Stream for Download {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> { self.rx.poll_recv(cx) }
}

/// Failure of one attempt, tagged with whether the failover policy should see it.
enum AttemptError {
    /// Produced by the namenode hop.
    Namenode(Error),
    /// Everything past the namenode, or a local error; never triggers failover.
    Terminal(Error),
}

impl AttemptError {
    fn into_error(self) -> Error {
        match self {
            AttemptError::Namenode(e) | AttemptError::Terminal(e) => e,
        }
    }
}

/// Validate the request and start streaming in a background task.
pub(crate) fn start<C: HttpClient>(shared: Arc<Shared<C>>, path: &str, options: OpenOptions) -> Result<Download> {
    validate_path(path)?;

    let (tx, rx) = mpsc::channel(CHUNK_QUEUE_DEPTH);
    let path = path.to_string();

    tokio::spawn(async move {
        let mut tracker = ProgressTracker::new(options.on_progress.clone());
        let result = tokio::select! {
            result = transfer(&shared, &path, &options, &tx, &mut tracker) => result,
            _ = tx.closed() => {
                debug!(path = %path, "download cancelled");
                return;
            }
        };

        match result {
            Ok(()) => {
                info!(path = %path, bytes = tracker.bytes_transferred(), "download completed");
                tracker.set_phase(TransferPhase::Completed);
            }
            Err(e) => {
                debug!(path = %path, error = %e, "download failed");
                tracker.set_phase(TransferPhase::Failed);
                let _ = tx.send(Err(e)).await;
            }
        }
    });

    Ok(Download { rx })
}

async fn transfer<C: HttpClient>(
    shared: &Shared<C>,
    path: &str,
    options: &OpenOptions,
    tx: &mpsc::Sender<Result<Bytes>>,
    tracker: &mut ProgressTracker,
) -> Result<()> {
    let params = options.params();
    let mut failover = Failover::begin(&shared.rotator);

    let response = loop {
        tracker.set_phase(TransferPhase::Connecting);
        match attempt(shared, failover.host(), path, &params, tracker).await {
            Ok(response) => break response,
            Err(e) if failover.attempt() == Attempt::Retry => return Err(failover.exhausted(e.into_error())),
            Err(AttemptError::Terminal(e)) => return Err(e),
            Err(AttemptError::Namenode(e)) => {
                failover.on_failure(e)?;
                tracker.set_phase(TransferPhase::Retrying);
                info!(path = %path, host = failover.host(), "restarting download against next namenode");
            }
        }
    };

    let mut body = response.body;
    while let Some(chunk) = next_chunk(&mut body, shared.config.timeouts.read).await? {
        if chunk.is_empty() {
            continue;
        }
        tracker.add_bytes(chunk.len() as u64);
        if tx.send(Ok(chunk)).await.is_err() {
            return Err(Error::Aborted);
        }
    }
    Ok(())
}

/// One pass over both hops, returning the response whose body is the file.
async fn attempt<C: HttpClient>(
    shared: &Shared<C>,
    host: usize,
    path: &str,
    params: &[(&'static str, String)],
    tracker: &mut ProgressTracker,
) -> std::result::Result<HttpResponse, AttemptError> {
    let url = shared
        .url(host, Operation::Open, path, params)
        .map_err(AttemptError::Terminal)?;
    debug!(%url, "opening file");

    let response = shared
        .exchange(shared.request(Method::Get, url.clone(), RequestBody::Empty))
        .await
        .map_err(AttemptError::Namenode)?;
    let status = response.status;
    let location = match classify_status(status, response.location.as_deref()) {
        ResponseClass::Success => return Ok(response),
        ResponseClass::Redirect(location) => location,
        ResponseClass::Failure => return Err(AttemptError::Namenode(shared.failure(response).await)),
        ResponseClass::Unexpected => {
            return Err(AttemptError::Terminal(Error::UnexpectedResponse {
                status,
                context: "namenode",
            }));
        }
    };

    let target = url.join(&location).map_err(|e| {
        AttemptError::Terminal(Error::InvalidResponse(format!(
            "bad datanode location {location:?}: {e}"
        )))
    })?;
    tracker.set_phase(TransferPhase::Redirected);
    debug!(url = %target, "following redirect");

    let response = shared
        .exchange(shared.request(Method::Get, target, RequestBody::Empty))
        .await
        .map_err(AttemptError::Terminal)?;
    let status = response.status;
    match classify_status(status, response.location.as_deref()) {
        ResponseClass::Success => Ok(response),
        ResponseClass::Failure => Err(AttemptError::Terminal(shared.failure(response).await)),
        ResponseClass::Redirect(_) | ResponseClass::Unexpected => Err(AttemptError::Terminal(
            Error::UnexpectedResponse {
                status,
                context: "datanode",
            },
        )),
    }
}
