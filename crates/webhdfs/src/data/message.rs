//! JSON bodies returned by the namenode for metadata operations.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct BooleanResp {
    pub boolean: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FileStatusWrapper {
    pub file_status: FileStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FileStatusesWrapper {
    pub file_statuses: FileStatuses,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FileStatuses {
    #[serde(default)]
    pub file_status: Vec<FileStatus>,
}

/// Answer to a first hop sent with `noredirect=true`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LocationResp {
    pub location: String,
}

/// Metadata of a single file or directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileStatus {
    pub path_suffix:       String,
    #[serde(rename = "type")]
    pub ty:                FileType,
    pub length:            u64,
    pub owner:             String,
    pub group:             String,
    pub permission:        String,
    pub access_time:       i64,
    pub modification_time: i64,
    pub block_size:        u64,
    pub replication:       u16,
}

impl FileStatus {
    pub fn is_dir(&self) -> bool { self.ty == FileType::Directory }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    Directory,
    #[default]
    File,
    Symlink,
}
