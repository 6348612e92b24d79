use std::fmt;
use std::sync::Arc;

use super::operation::Params;
use super::progress::{Progress, ProgressCallback};

/// Permission applied to files and directories created without an explicit one.
pub const DEFAULT_PERMISSION: &str = "0777";

/// Options for `CREATE` and `APPEND`.
///
/// Create-only parameters (`overwrite`, `permission`, `replication`, `block_size`)
/// are not sent with an append.
///
/// # Examples
///
/// ```
/// use webhdfs::WriteOptions;
///
/// let options = WriteOptions::default()
///     .overwrite(false)
///     .permission("0644")
///     .replication(2);
/// ```
#[derive(Clone)]
pub struct WriteOptions {
    /// Replace an existing file on create.
    ///
    /// Default: true
    pub overwrite:   bool,

    /// Octal permission of a newly created file.
    ///
    /// Default: `0777`
    pub permission:  String,

    pub replication: Option<u16>,
    pub block_size:  Option<u64>,
    pub buffer_size: Option<u32>,

    /// Overrides the configured `user.name` for this call.
    pub user:        Option<String>,

    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for WriteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOptions")
            .field("overwrite", &self.overwrite)
            .field("permission", &self.permission)
            .field("replication", &self.replication)
            .field("block_size", &self.block_size)
            .field("buffer_size", &self.buffer_size)
            .field("user", &self.user)
            .field("on_progress", &self.on_progress.as_ref().map(|_| "{ ... }"))
            .finish()
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            overwrite:   true,
            permission:  DEFAULT_PERMISSION.to_string(),
            replication: None,
            block_size:  None,
            buffer_size: None,
            user:        None,
            on_progress: None,
        }
    }
}

impl WriteOptions {
    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = permission.into();
        self
    }

    #[must_use]
    pub fn replication(mut self, replication: u16) -> Self {
        self.replication = Some(replication);
        self
    }

    #[must_use]
    pub fn block_size(mut self, block_size: u64) -> Self {
        self.block_size = Some(block_size);
        self
    }

    #[must_use]
    pub fn buffer_size(mut self, buffer_size: u32) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn on_progress(mut self, on_progress: Arc<dyn Fn(&Progress) + Send + Sync>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub(crate) fn create_params(&self) -> Params {
        let mut params: Params = vec![
            ("overwrite", self.overwrite.to_string()),
            ("permission", self.permission.clone()),
        ];
        if let Some(replication) = self.replication {
            params.push(("replication", replication.to_string()));
        }
        if let Some(block_size) = self.block_size {
            params.push(("blocksize", block_size.to_string()));
        }
        self.push_common(&mut params);
        params
    }

    pub(crate) fn append_params(&self) -> Params {
        let mut params = Params::new();
        self.push_common(&mut params);
        params
    }

    fn push_common(&self, params: &mut Params) {
        if let Some(buffer_size) = self.buffer_size {
            params.push(("buffersize", buffer_size.to_string()));
        }
        if let Some(ref user) = self.user {
            params.push(("user.name", user.clone()));
        }
    }
}

/// Options for `OPEN`.
#[derive(Clone, Default)]
pub struct OpenOptions {
    /// Byte offset to start reading from.
    pub offset:      Option<u64>,
    /// Maximum number of bytes to read.
    pub length:      Option<u64>,
    pub buffer_size: Option<u32>,
    pub user:        Option<String>,
    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenOptions")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("buffer_size", &self.buffer_size)
            .field("user", &self.user)
            .field("on_progress", &self.on_progress.as_ref().map(|_| "{ ... }"))
            .finish()
    }
}

impl OpenOptions {
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    #[must_use]
    pub fn buffer_size(mut self, buffer_size: u32) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn on_progress(mut self, on_progress: Arc<dyn Fn(&Progress) + Send + Sync>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub(crate) fn params(&self) -> Params {
        let mut params = Params::new();
        if let Some(offset) = self.offset {
            params.push(("offset", offset.to_string()));
        }
        if let Some(length) = self.length {
            params.push(("length", length.to_string()));
        }
        if let Some(buffer_size) = self.buffer_size {
            params.push(("buffersize", buffer_size.to_string()));
        }
        if let Some(ref user) = self.user {
            params.push(("user.name", user.clone()));
        }
        params
    }
}

/// Options for `MKDIRS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MkdirOptions {
    pub permission: String,
}

impl Default for MkdirOptions {
    fn default() -> Self {
        Self {
            permission: DEFAULT_PERMISSION.to_string(),
        }
    }
}

impl MkdirOptions {
    #[must_use]
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = permission.into();
        self
    }

    pub(crate) fn params(&self) -> Params { vec![("permission", self.permission.clone())] }
}
