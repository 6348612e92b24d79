use std::fmt;

/// Extra query parameters attached to an operation URL, in insertion order.
pub type Params = Vec<(&'static str, String)>;

/// HTTP verbs used by the WebHDFS REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// WebHDFS operations, sent as the `op` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Open,
    Create,
    Append,
    Mkdirs,
    Rename,
    Delete,
    GetFileStatus,
    ListStatus,
    SetPermission,
    SetOwner,
    CreateSymlink,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Open => "OPEN",
            Operation::Create => "CREATE",
            Operation::Append => "APPEND",
            Operation::Mkdirs => "MKDIRS",
            Operation::Rename => "RENAME",
            Operation::Delete => "DELETE",
            Operation::GetFileStatus => "GETFILESTATUS",
            Operation::ListStatus => "LISTSTATUS",
            Operation::SetPermission => "SETPERMISSION",
            Operation::SetOwner => "SETOWNER",
            Operation::CreateSymlink => "CREATESYMLINK",
        }
    }

    /// The HTTP method the namenode expects for this operation.
    pub fn method(&self) -> Method {
        match self {
            Operation::Open | Operation::GetFileStatus | Operation::ListStatus => Method::Get,
            Operation::Append => Method::Post,
            Operation::Delete => Method::Delete,
            Operation::Create
            | Operation::Mkdirs
            | Operation::Rename
            | Operation::SetPermission
            | Operation::SetOwner
            | Operation::CreateSymlink => Method::Put,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_methods() {
        assert_eq!(Operation::Open.method(), Method::Get);
        assert_eq!(Operation::Create.method(), Method::Put);
        assert_eq!(Operation::Append.method(), Method::Post);
        assert_eq!(Operation::Delete.method(), Method::Delete);
        assert_eq!(Operation::ListStatus.method(), Method::Get);
        assert_eq!(Operation::CreateSymlink.method(), Method::Put);
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::GetFileStatus.to_string(), "GETFILESTATUS");
        assert_eq!(Operation::SetOwner.as_str(), "SETOWNER");
        assert_eq!(Method::Post.to_string(), "POST");
    }
}
