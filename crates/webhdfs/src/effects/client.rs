use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncRead;
use tracing::debug;

use super::download::{self, Download};
use super::http::HttpClient;
use super::request::Shared;
use super::upload::{self, Upload, UploadOutcome};
use crate::core::validate_path;
use crate::data::message::{BooleanResp, FileStatusWrapper, FileStatusesWrapper};
use crate::data::{ClientConfig, FileStatus, MkdirOptions, OpenOptions, Operation, Params, WriteOptions};
use crate::error::{Error, Result};

/// WebHDFS client.
///
/// Cheap to clone; clones share the configuration, the transport and the
/// active-namenode cursor.
///
/// # Examples
///
/// ```no_run
/// use webhdfs::{ClientConfig, WebHdfsClient, WriteOptions};
///
/// # async fn example() -> webhdfs::Result<()> {
/// let client = WebHdfsClient::new(ClientConfig::new("nn1,nn2").port(9870).user("hdfs"))?;
/// client.write_file("/tmp/hello.txt", "hello", WriteOptions::default()).await?;
/// let data = client.read_file("/tmp/hello.txt").await?;
/// assert_eq!(&data[..], b"hello");
/// # Ok(())
/// # }
/// ```
pub struct WebHdfsClient<C: HttpClient> {
    shared: Arc<Shared<C>>,
}

impl<C: HttpClient> Clone for WebHdfsClient<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: HttpClient> fmt::Debug for WebHdfsClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebHdfsClient")
            .field("config", &self.shared.config)
            .field("active_host", &self.shared.rotator.active())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "reqwest")]
impl WebHdfsClient<super::http::ReqwestClient> {
    /// Create a client backed by reqwest.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = super::http::ReqwestClient::from_config(&config)?;
        Self::with_http_client(config, http)
    }
}

impl<C: HttpClient> WebHdfsClient<C> {
    /// Create a client over a custom transport.
    pub fn with_http_client(config: ClientConfig, http: C) -> Result<Self> {
        Ok(Self {
            shared: Arc::new(Shared::new(config, http)?),
        })
    }

    pub fn config(&self) -> &ClientConfig { &self.shared.config }

    /// The namenode the next operation will try first.
    pub fn active_host(&self) -> &str { &self.shared.config.hosts[self.shared.rotator.active()] }

    /// Start an upload to `path`, creating the file or appending to it.
    ///
    /// Must be called from within a Tokio runtime. Path errors are reported here;
    /// everything else arrives through [`Upload::finish`].
    pub fn open_upload(&self, path: &str, append: bool, options: WriteOptions) -> Result<Upload> {
        upload::start(Arc::clone(&self.shared), path, append, options)
    }

    /// Start downloading `path`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open_download(&self, path: &str, options: OpenOptions) -> Result<Download> {
        download::start(Arc::clone(&self.shared), path, options)
    }

    /// Create `path` with `data` as its content.
    pub async fn write_file(
        &self,
        path: &str,
        data: impl Into<Bytes>,
        options: WriteOptions,
    ) -> Result<UploadOutcome> {
        self.put_buffer(path, false, data.into(), options).await
    }

    /// Append `data` to the existing file at `path`.
    pub async fn append_file(
        &self,
        path: &str,
        data: impl Into<Bytes>,
        options: WriteOptions,
    ) -> Result<UploadOutcome> {
        self.put_buffer(path, true, data.into(), options).await
    }

    /// Stream everything `reader` yields into `path`.
    pub async fn upload_from<R>(
        &self,
        path: &str,
        append: bool,
        reader: R,
        options: WriteOptions,
    ) -> Result<UploadOutcome>
    where
        R: AsyncRead + Unpin,
    {
        let mut upload = self.open_upload(path, append, options)?;
        match upload.copy_from(reader).await {
            Ok(_) | Err(Error::UploadClosed) => upload.finish().await,
            Err(e) => Err(e),
        }
    }

    /// Read the whole file at `path` into memory.
    pub async fn read_file(&self, path: &str) -> Result<Bytes> {
        self.open_download(path, OpenOptions::default())?.read_to_end().await
    }

    async fn put_buffer(&self, path: &str, append: bool, data: Bytes, options: WriteOptions) -> Result<UploadOutcome> {
        let mut upload = self.open_upload(path, append, options)?;
        // A closed upload already has its failure waiting in `finish`.
        if let Err(e) = upload.write(data).await
            && !matches!(e, Error::UploadClosed)
        {
            return Err(e);
        }
        upload.finish().await
    }

    /// Create `path` and any missing parents.
    pub async fn mkdir(&self, path: &str, options: MkdirOptions) -> Result<bool> {
        let resp: BooleanResp = self
            .shared
            .call_json(Operation::Mkdirs, path, &options.params())
            .await?;
        Ok(resp.boolean)
    }

    /// Set the octal permission of `path`, e.g. `"0755"`.
    pub async fn chmod(&self, path: &str, mode: &str) -> Result<()> {
        self.shared
            .call(Operation::SetPermission, path, &[("permission", mode.to_string())])
            .await?;
        Ok(())
    }

    /// Change the owner and group of `path`. An empty string leaves that part unchanged.
    pub async fn chown(&self, path: &str, owner: &str, group: &str) -> Result<()> {
        let mut params = Params::new();
        if !owner.is_empty() {
            params.push(("owner", owner.to_string()));
        }
        if !group.is_empty() {
            params.push(("group", group.to_string()));
        }
        self.shared.call(Operation::SetOwner, path, &params).await?;
        Ok(())
    }

    /// Move `from` to `to`. Returns the namenode's verdict.
    pub async fn rename(&self, from: &str, to: &str) -> Result<bool> {
        validate_path(to)?;
        let resp: BooleanResp = self
            .shared
            .call_json(Operation::Rename, from, &[("destination", to.to_string())])
            .await?;
        Ok(resp.boolean)
    }

    pub async fn stat(&self, path: &str) -> Result<FileStatus> {
        let resp: FileStatusWrapper = self.shared.call_json(Operation::GetFileStatus, path, &[]).await?;
        Ok(resp.file_status)
    }

    /// Whether `path` exists. Only a not-found answer maps to `false`.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => {
                debug!(path, "path does not exist");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// List the entries of the directory at `path`.
    pub async fn readdir(&self, path: &str) -> Result<Vec<FileStatus>> {
        let resp: FileStatusesWrapper = self.shared.call_json(Operation::ListStatus, path, &[]).await?;
        Ok(resp.file_statuses.file_status)
    }

    /// Create a symbolic link at `link` pointing to `target`.
    pub async fn symlink(&self, target: &str, link: &str, create_parent: bool) -> Result<()> {
        validate_path(target)?;
        let params = vec![
            ("destination", target.to_string()),
            ("createParent", create_parent.to_string()),
        ];
        self.shared.call(Operation::CreateSymlink, link, &params).await?;
        Ok(())
    }

    /// Delete `path`; directories with children need `recursive`.
    pub async fn unlink(&self, path: &str, recursive: bool) -> Result<bool> {
        let resp: BooleanResp = self
            .shared
            .call_json(Operation::Delete, path, &[("recursive", recursive.to_string())])
            .await?;
        Ok(resp.boolean)
    }

    pub async fn rmdir(&self, path: &str, recursive: bool) -> Result<bool> { self.unlink(path, recursive).await }
}
