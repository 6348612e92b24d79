//! Shared client state and the one-shot request path used by metadata operations.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::http::{BoxStream, HttpClient, HttpRequest, HttpResponse, RequestBody};
use crate::core::{Failover, HostRotator, ResponseClass, build_url, classify_status, remote_error_for_status};
use crate::data::{ClientConfig, Method, Operation};
use crate::error::{Error, Result, TransportError};

pub(crate) type ResponseBody = BoxStream<'static, std::result::Result<Bytes, TransportError>>;

/// State shared by a client and every transfer task it spawns.
pub(crate) struct Shared<C> {
    pub(crate) config:  ClientConfig,
    pub(crate) rotator: HostRotator,
    pub(crate) http:    C,
}

impl<C: HttpClient> Shared<C> {
    pub(crate) fn new(config: ClientConfig, http: C) -> Result<Self> {
        config.validate()?;
        let rotator = HostRotator::new(config.hosts.len());
        Ok(Self { config, rotator, http })
    }

    pub(crate) fn url(
        &self,
        host: usize,
        operation: Operation,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<Url> {
        build_url(&self.config, host, operation, path, params)
    }

    /// Wrap a request with the configured headers.
    pub(crate) fn request(&self, method: Method, url: Url, body: RequestBody) -> HttpRequest {
        let headers = self
            .config
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        HttpRequest {
            method,
            url,
            headers,
            body,
        }
    }

    /// Send a request whose response head must arrive within the redirect timeout.
    pub(crate) async fn exchange(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = tokio::time::timeout(self.config.timeouts.redirect, self.http.send(request))
            .await
            .map_err(|_| Error::Timeout("response headers"))??;
        Ok(response)
    }

    pub(crate) async fn drain(&self, body: ResponseBody) -> Result<Bytes> { drain(body, self.config.timeouts.read).await }

    /// Read the body of a failed response and decode the error it carries.
    pub(crate) async fn failure(&self, response: HttpResponse) -> Error {
        let status = response.status;
        match self.drain(response.body).await {
            Ok(body) => Error::Remote(remote_error_for_status(status, &body, &self.config.error_schema)),
            Err(e) => e,
        }
    }

    /// Run a single-request operation against the active namenode, failing over once if needed.
    pub(crate) async fn call(
        &self,
        operation: Operation,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<Bytes> {
        let mut failover = Failover::begin(&self.rotator);
        loop {
            match self.call_once(failover.host(), operation, path, params).await {
                Ok(body) => return Ok(body),
                Err(e) => failover.on_failure(e)?,
            }
        }
    }

    pub(crate) async fn call_json<T: DeserializeOwned>(
        &self,
        operation: Operation,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T> {
        let body = self.call(operation, path, params).await?;
        decode(&body)
    }

    async fn call_once(
        &self,
        host: usize,
        operation: Operation,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<Bytes> {
        let url = self.url(host, operation, path, params)?;
        debug!(method = %operation.method(), %url, "sending request");

        let response = self
            .exchange(self.request(operation.method(), url, RequestBody::Empty))
            .await?;
        let status = response.status;
        match classify_status(status, response.location.as_deref()) {
            ResponseClass::Success => self.drain(response.body).await,
            ResponseClass::Failure => Err(self.failure(response).await),
            ResponseClass::Redirect(_) => Err(Error::UnexpectedResponse {
                status,
                context: "unexpected redirect",
            }),
            ResponseClass::Unexpected => Err(Error::UnexpectedResponse {
                status,
                context: operation.as_str(),
            }),
        }
    }
}

pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::InvalidResponse(e.to_string()))
}

/// Pull the next chunk, giving up if the peer stays silent for `read_timeout`.
pub(crate) async fn next_chunk(body: &mut ResponseBody, read_timeout: Duration) -> Result<Option<Bytes>> {
    match tokio::time::timeout(read_timeout, body.next()).await {
        Err(_) => Err(Error::Timeout("next response chunk")),
        Ok(None) => Ok(None),
        Ok(Some(chunk)) => Ok(Some(chunk?)),
    }
}

pub(crate) async fn drain(mut body: ResponseBody, read_timeout: Duration) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = next_chunk(&mut body, read_timeout).await? {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
