//! Streaming upload: the first hop asks the namenode where to write, the second
//! hop streams the caller's bytes to the datanode it named.
//!
//! The caller gets an [`Upload`] handle immediately. Bytes written to it queue in
//! a bounded channel that becomes the second hop's request body, so nothing is
//! sent before the datanode location is known and a slow datanode throttles the
//! writer.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::http::{BodySender, BodyStream, HttpClient, RequestBody};
use super::request::{Shared, decode};
use crate::core::{ResponseClass, classify_status, validate_path};
use crate::data::message::LocationResp;
use crate::data::progress::ProgressTracker;
use crate::data::{Operation, TransferPhase, WriteOptions};
use crate::error::{Error, Result};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// `Location` header of the datanode's 201, pointing at the written file.
    pub location:      Option<String>,
    pub bytes_written: u64,
}

/// Write half of an in-flight upload.
///
/// Call [`Upload::finish`] to end the body and wait for the datanode's answer.
/// Dropping the handle without finishing aborts the transfer.
#[derive(Debug)]
pub struct Upload {
    data:    Option<BodySender>,
    abort:   Option<oneshot::Sender<()>>,
    outcome: Option<oneshot::Receiver<Result<UploadOutcome>>>,
}

impl Upload {
    /// Queue a chunk for the datanode.
    ///
    /// Waits while the buffer is full, which includes the time until the namenode
    /// redirect arrives. Returns [`Error::UploadClosed`] once the transfer has ended;
    /// [`Upload::finish`] then reports why.
    pub async fn write(&mut self, chunk: impl Into<Bytes>) -> Result<()> {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return Ok(());
        }
        let data = self.data.as_ref().ok_or(Error::UploadClosed)?;
        data.send(Ok(chunk)).await.map_err(|_| Error::UploadClosed)
    }

    /// Copy `reader` to the end into the upload and return the number of bytes read.
    pub async fn copy_from<R>(&mut self, mut reader: R) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        let mut total = 0u64;
        let mut buf = BytesMut::with_capacity(COPY_BUFFER_SIZE);
        loop {
            buf.reserve(COPY_BUFFER_SIZE);
            let n = match reader.read_buf(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    // Fail the request body so the datanode does not keep a truncated file.
                    if let Some(data) = self.data.take() {
                        let _ = data.send(Err(io::Error::new(e.kind(), e.to_string()))).await;
                    }
                    return Err(Error::Io(e));
                }
            };
            if n == 0 {
                return Ok(total);
            }
            self.write(buf.split().freeze()).await?;
            total += n as u64;
        }
    }

    /// End the body and wait for the transfer's single outcome.
    pub async fn finish(mut self) -> Result<UploadOutcome> {
        if let Some(data) = self.data.take() {
            data.seal();
        }
        let outcome = self.outcome.take().ok_or(Error::UploadClosed)?;
        outcome.await.unwrap_or(Err(Error::Aborted))
    }

    /// Cancel the transfer. No outcome is reported afterwards.
    pub fn abort(mut self) {
        if let Some(abort) = self.abort.take() {
            let _ = abort.send(());
        }
    }
}

/// Validate the request, then hand back the write half while the transfer runs in its own task.
pub(crate) fn start<C: HttpClient>(
    shared: Arc<Shared<C>>,
    path: &str,
    append: bool,
    options: WriteOptions,
) -> Result<Upload> {
    validate_path(path)?;

    let (data_tx, body) = BodyStream::channel(shared.config.upload_buffer);
    let (abort_tx, abort_rx) = oneshot::channel();
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let path = path.to_string();

    tokio::spawn(async move {
        let tracker = Arc::new(Mutex::new(ProgressTracker::new(options.on_progress.clone())));
        let result = tokio::select! {
            result = transfer(&shared, &path, append, &options, body, &tracker) => result,
            _ = abort_rx => Err(Error::Aborted),
        };

        let mut tracker = tracker.lock().unwrap_or_else(PoisonError::into_inner);
        let result = result.map(|location| UploadOutcome {
            location,
            bytes_written: tracker.bytes_transferred(),
        });
        match &result {
            Ok(outcome) => {
                info!(path = %path, bytes = outcome.bytes_written, "upload completed");
                tracker.set_phase(TransferPhase::Completed);
            }
            Err(e) => {
                debug!(path = %path, error = %e, "upload failed");
                tracker.set_phase(TransferPhase::Failed);
            }
        }
        drop(tracker);
        let _ = outcome_tx.send(result);
    });

    Ok(Upload {
        data:    Some(data_tx),
        abort:   Some(abort_tx),
        outcome: Some(outcome_rx),
    })
}

async fn transfer<C: HttpClient>(
    shared: &Shared<C>,
    path: &str,
    append: bool,
    options: &WriteOptions,
    body: BodyStream,
    tracker: &Arc<Mutex<ProgressTracker>>,
) -> Result<Option<String>> {
    let (operation, params) = if append {
        (Operation::Append, options.append_params())
    } else {
        (Operation::Create, options.create_params())
    };

    set_phase(tracker, TransferPhase::Connecting);
    let url = shared.url(shared.rotator.active(), operation, path, &params)?;
    debug!(%url, "asking namenode for a datanode");
    let mut request = shared.request(operation.method(), url.clone(), RequestBody::Empty);
    request.headers.push(content_type());

    let response = shared.exchange(request).await?;
    let status = response.status;
    let location = match classify_status(status, response.location.as_deref()) {
        ResponseClass::Redirect(location) => location,
        ResponseClass::Success => {
            // Answer to `noredirect=true`: the datanode location comes back as JSON.
            let body = shared.drain(response.body).await?;
            decode::<LocationResp>(&body)
                .map_err(|_| Error::UnexpectedResponse {
                    status,
                    context: "namenode accepted the write without naming a datanode",
                })?
                .location
        }
        ResponseClass::Failure => return Err(shared.failure(response).await),
        ResponseClass::Unexpected => {
            return Err(Error::UnexpectedResponse {
                status,
                context: "namenode",
            });
        }
    };

    let target = url
        .join(&location)
        .map_err(|e| Error::InvalidResponse(format!("bad datanode location {location:?}: {e}")))?;
    set_phase(tracker, TransferPhase::Redirected);
    debug!(url = %target, "streaming to datanode");

    let mut body = body.with_progress(Arc::clone(tracker));
    let body_finished = body.finished();
    let mut request = shared.request(operation.method(), target, RequestBody::Stream(body));
    request.headers.push(content_type());

    // The writer sets the pace until the body ends; only the datanode's answer is bounded.
    let send = shared.http.send(request);
    tokio::pin!(send);
    let response = tokio::select! {
        response = &mut send => Some(response),
        _ = body_finished => None,
    };
    let response = match response {
        Some(response) => response?,
        None => tokio::time::timeout(shared.config.timeouts.redirect, send)
            .await
            .map_err(|_| Error::Timeout("datanode response"))??,
    };
    let status = response.status;
    match classify_status(status, response.location.as_deref()) {
        ResponseClass::Success => Ok(response.location),
        ResponseClass::Failure => Err(shared.failure(response).await),
        ResponseClass::Redirect(_) | ResponseClass::Unexpected => Err(Error::UnexpectedResponse {
            status,
            context: "datanode",
        }),
    }
}

fn content_type() -> (String, String) {
    ("Content-Type".to_string(), "application/octet-stream".to_string())
}

fn set_phase(tracker: &Mutex<ProgressTracker>, phase: TransferPhase) {
    tracker.lock().unwrap_or_else(PoisonError::into_inner).set_phase(phase);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::data::{ClientConfig, Method, Progress, Timeouts};
    use crate::effects::mock::{MockHttpClient, Reply};

    const DATANODE: &str = "http://dn1:9864/webhdfs/v1/files/x?op=CREATE&namenoderpcaddress=nn1:8020";

    fn shared(config: ClientConfig, script: Vec<Reply>) -> Arc<Shared<MockHttpClient>> {
        Arc::new(Shared::new(config, MockHttpClient::new(script)).unwrap())
    }

    #[tokio::test]
    async fn test_upload_two_hops() {
        let shared = shared(
            ClientConfig::new("nn1").user("webuser"),
            vec![
                Reply::redirect(DATANODE),
                Reply::status(201),
            ],
        );

        let mut upload = start(Arc::clone(&shared), "/files/x", false, WriteOptions::default()).unwrap();
        upload.write("random ").await.unwrap();
        upload.write(Bytes::from_static(b"data")).await.unwrap();
        let outcome = upload.finish().await.unwrap();
        assert_eq!(outcome.bytes_written, 11);

        let requests = shared.http.requests();
        assert_eq!(requests.len(), 2);

        let first = &requests[0];
        assert_eq!(first.method, Method::Put);
        assert_eq!(first.url.host_str(), Some("nn1"));
        assert_eq!(first.query("op").as_deref(), Some("CREATE"));
        assert_eq!(first.query("overwrite").as_deref(), Some("true"));
        assert_eq!(first.query("permission").as_deref(), Some("0777"));
        assert_eq!(first.query("user.name").as_deref(), Some("webuser"));
        assert!(first.body.is_none());

        let second = &requests[1];
        assert_eq!(second.url.as_str(), DATANODE);
        assert_eq!(second.body.as_deref(), Some(&b"random data"[..]));
        assert!(
            second
                .headers
                .contains(&("Content-Type".to_string(), "application/octet-stream".to_string()))
        );
    }

    #[tokio::test]
    async fn test_append_uses_post() {
        let shared = shared(
            ClientConfig::new("nn1"),
            vec![Reply::redirect("http://dn1:9864/a?op=APPEND"), Reply::status(200)],
        );
        let mut upload = start(Arc::clone(&shared), "/a", true, WriteOptions::default()).unwrap();
        upload.write("more random data").await.unwrap();
        upload.finish().await.unwrap();

        let requests = shared.http.requests();
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].query("op").as_deref(), Some("APPEND"));
        assert_eq!(requests[0].query("overwrite"), None);
        assert_eq!(requests[1].method, Method::Post);
    }

    #[tokio::test]
    async fn test_upload_noredirect_location_body() {
        let shared = shared(
            ClientConfig::new("nn1"),
            vec![
                Reply::body(200, &format!(r#"{{"Location":"{DATANODE}"}}"#)),
                Reply::status(201),
            ],
        );
        let mut upload = start(Arc::clone(&shared), "/files/x", false, WriteOptions::default()).unwrap();
        upload.write("abc").await.unwrap();
        upload.finish().await.unwrap();
        assert_eq!(shared.http.requests()[1].url.as_str(), DATANODE);
    }

    #[tokio::test]
    async fn test_upload_namenode_error_is_reported_once() {
        let shared = shared(
            ClientConfig::new("nn1,nn2"),
            vec![Reply::body(
                403,
                r#"{"RemoteException":{"exception":"AccessControlException","message":"Permission denied"}}"#,
            )],
        );
        let mut upload = start(Arc::clone(&shared), "/a", false, WriteOptions::default()).unwrap();
        // The writer may or may not see the closed channel depending on timing.
        let _ = upload.write("data").await;
        let err = upload.finish().await.unwrap_err();
        assert_eq!(err.exception(), Some("AccessControlException"));
        assert_eq!(shared.http.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_does_not_fail_over() {
        let shared = shared(ClientConfig::new("nn1,nn2"), vec![Reply::refused()]);
        let upload = start(Arc::clone(&shared), "/a", false, WriteOptions::default()).unwrap();
        let err = upload.finish().await.unwrap_err();
        assert!(matches!(err, Error::Transport(ref e) if e.is_connection_refused()));
        assert_eq!(shared.http.requests().len(), 1);
        assert_eq!(shared.rotator.active(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejects_unexpected_first_hop() {
        let shared = shared(ClientConfig::new("nn1"), vec![Reply::status(307)]);
        let upload = start(Arc::clone(&shared), "/a", false, WriteOptions::default()).unwrap();
        let err = upload.finish().await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { status: 307, .. }));
    }

    #[tokio::test]
    async fn test_upload_datanode_error() {
        let shared = shared(
            ClientConfig::new("nn1"),
            vec![
                Reply::redirect(DATANODE),
                Reply::body(
                    500,
                    r#"{"RemoteException":{"exception":"IOException","message":"disk full"}}"#,
                ),
            ],
        );
        let mut upload = start(Arc::clone(&shared), "/files/x", false, WriteOptions::default()).unwrap();
        let _ = upload.write("data").await;
        let err = upload.finish().await.unwrap_err();
        assert_eq!(err.exception(), Some("IOException"));
        assert_eq!(err.remote().unwrap().message, "disk full");
    }

    #[tokio::test]
    async fn test_upload_invalid_path_fails_before_io() {
        let shared = shared(ClientConfig::new("nn1"), vec![]);
        let err = start(Arc::clone(&shared), "no-slash", false, WriteOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));
        assert!(shared.http.requests().is_empty());
    }

    #[tokio::test]
    async fn test_upload_copy_from_reader() {
        let shared = shared(
            ClientConfig::new("nn1"),
            vec![Reply::redirect(DATANODE), Reply::status(201)],
        );
        let data = vec![7u8; COPY_BUFFER_SIZE * 2 + 10];
        let mut upload = start(Arc::clone(&shared), "/files/x", false, WriteOptions::default()).unwrap();
        let copied = upload.copy_from(&data[..]).await.unwrap();
        assert_eq!(copied, data.len() as u64);
        upload.finish().await.unwrap();
        assert_eq!(shared.http.requests()[1].body.as_deref(), Some(&data[..]));
    }

    #[tokio::test]
    async fn test_upload_reports_progress() {
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        let options = WriteOptions::default().on_progress(Arc::new(move |p: &Progress| {
            sink.lock().unwrap().push(p.phase);
        }));

        let shared = shared(
            ClientConfig::new("nn1"),
            vec![Reply::redirect(DATANODE), Reply::status(201)],
        );
        let mut upload = start(Arc::clone(&shared), "/files/x", false, options).unwrap();
        upload.write("abc").await.unwrap();
        upload.finish().await.unwrap();

        let phases = phases.lock().unwrap();
        assert_eq!(phases[0], TransferPhase::Connecting);
        assert_eq!(phases[1], TransferPhase::Redirected);
        assert!(phases.contains(&TransferPhase::Streaming));
        assert_eq!(phases.last(), Some(&TransferPhase::Completed));
    }

    #[tokio::test]
    async fn test_upload_abort() {
        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        let options = WriteOptions::default().on_progress(Arc::new(move |p: &Progress| {
            sink.lock().unwrap().push(p.phase);
        }));

        let shared = shared(ClientConfig::new("nn1"), vec![Reply::Stall]);
        let upload = start(Arc::clone(&shared), "/files/x", false, options).unwrap();
        upload.abort();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !phases.lock().unwrap().contains(&TransferPhase::Failed) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_upload_never_completes_a_body() {
        let shared = shared(
            ClientConfig::new("nn1"),
            vec![Reply::redirect(DATANODE), Reply::status(201)],
        );
        let mut upload = start(Arc::clone(&shared), "/files/x", false, WriteOptions::default()).unwrap();
        upload.write("random").await.unwrap();
        drop(upload);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(shared.http.requests().iter().all(|r| r.body.is_none()));
    }

    #[tokio::test]
    async fn test_upload_datanode_answer_timeout() {
        let config = ClientConfig::new("nn1").timeouts(Timeouts {
            connect:  Duration::from_millis(50),
            redirect: Duration::from_millis(50),
            read:     Duration::from_millis(50),
        });
        let shared = shared(config, vec![Reply::redirect(DATANODE), Reply::Stall]);
        let mut upload = start(Arc::clone(&shared), "/files/x", false, WriteOptions::default()).unwrap();
        upload.write("random data").await.unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), upload.finish())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, Error::Timeout("datanode response")));
        assert_eq!(shared.http.requests()[1].body.as_deref(), Some(&b"random data"[..]));
    }

    #[tokio::test]
    async fn test_slow_writer_is_not_timed_out() {
        let config = ClientConfig::new("nn1").timeouts(Timeouts {
            redirect: Duration::from_millis(50),
            ..Timeouts::default()
        });
        let shared = shared(config, vec![Reply::redirect(DATANODE), Reply::status(201)]);
        let mut upload = start(Arc::clone(&shared), "/files/x", false, WriteOptions::default()).unwrap();
        upload.write("random ").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        upload.write("data").await.unwrap();

        let outcome = upload.finish().await.unwrap();
        assert_eq!(outcome.bytes_written, 11);
    }

    #[tokio::test]
    async fn test_upload_first_hop_timeout() {
        let config = ClientConfig::new("nn1").timeouts(Timeouts {
            redirect: Duration::from_millis(50),
            ..Timeouts::default()
        });
        let shared = shared(config, vec![Reply::Stall]);
        let upload = start(Arc::clone(&shared), "/files/x", false, WriteOptions::default()).unwrap();
        let err = upload.finish().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }
}
