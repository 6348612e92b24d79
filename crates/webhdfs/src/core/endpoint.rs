use url::Url;

use crate::data::config::parse_host;
use crate::data::{ClientConfig, Operation};
use crate::error::{Error, Result};

/// Build the namenode URL for `operation` on `path` against host `host_index`.
///
/// The base path is prefixed to `path`, `op` comes first, then `user.name` from
/// the configuration, then `params`. A `user.name` in `params` replaces the
/// configured identity.
///
/// # Examples
///
/// ```
/// use webhdfs::{ClientConfig, Operation};
/// use webhdfs::core::build_url;
///
/// let config = ClientConfig::new("nn1").port(9870).user("hdfs");
/// let url = build_url(&config, 0, Operation::Open, "/tmp/a.txt", &[]).unwrap();
/// assert_eq!(url.as_str(), "http://nn1:9870/webhdfs/v1/tmp/a.txt?op=OPEN&user.name=hdfs");
/// ```
pub fn build_url(
    config: &ClientConfig,
    host_index: usize,
    operation: Operation,
    path: &str,
    params: &[(&'static str, String)],
) -> Result<Url> {
    validate_path(path)?;

    if config.hosts.is_empty() {
        return Err(Error::InvalidConfig("host list is empty".to_string()));
    }
    let host = &config.hosts[host_index % config.hosts.len()];
    let addr = parse_host(host)?;
    let port = addr.port.unwrap_or(config.port);

    let mut url = Url::parse(&format!("{}://{}:{}/", config.scheme, addr.name, port))
        .map_err(|e| Error::InvalidConfig(format!("host {host:?} is not usable: {e}")))?;
    url.set_path(&format!("{}{}", config.path.trim_end_matches('/'), path));

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("op", operation.as_str());

        let user_overridden = params.iter().any(|(k, _)| *k == "user.name");
        if let (Some(user), false) = (&config.user, user_overridden) {
            query.append_pair("user.name", user);
        }
        for (key, value) in params {
            query.append_pair(key, value);
        }
    }

    Ok(url)
}

/// Resource paths must be absolute; they are appended to the base path verbatim.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() || !path.starts_with('/') {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_basic() {
        let config = ClientConfig::default();
        let url = build_url(&config, 0, Operation::GetFileStatus, "/files/x", &[]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:50070/webhdfs/v1/files/x?op=GETFILESTATUS"
        );
    }

    #[test]
    fn test_build_url_identity_and_params() {
        let config = ClientConfig::new("nn1").user("webuser");
        let params = vec![("overwrite", "true".to_string()), ("permission", "0777".to_string())];
        let url = build_url(&config, 0, Operation::Create, "/a", &params).unwrap();
        assert_eq!(
            url.query(),
            Some("op=CREATE&user.name=webuser&overwrite=true&permission=0777")
        );
    }

    #[test]
    fn test_build_url_param_overrides_identity() {
        let config = ClientConfig::new("nn1").user("webuser");
        let params = vec![("user.name", "testuser".to_string())];
        let url = build_url(&config, 0, Operation::Create, "/a", &params).unwrap();
        assert_eq!(url.query(), Some("op=CREATE&user.name=testuser"));
    }

    #[test]
    fn test_build_url_selects_active_host() {
        let config = ClientConfig::new("nn1,nn2:8020").port(9870).scheme(crate::data::Scheme::Https);
        let first = build_url(&config, 0, Operation::Open, "/a", &[]).unwrap();
        let second = build_url(&config, 1, Operation::Open, "/a", &[]).unwrap();
        assert_eq!(first.host_str(), Some("nn1"));
        assert_eq!(first.port(), Some(9870));
        assert_eq!(first.scheme(), "https");
        assert_eq!(second.host_str(), Some("nn2"));
        assert_eq!(second.port(), Some(8020));
    }

    #[test]
    fn test_build_url_encodes_path() {
        let config = ClientConfig::new("nn1").path("/webhdfs/v1/");
        let url = build_url(&config, 0, Operation::Open, "/dir/with space#1", &[]).unwrap();
        assert_eq!(url.path(), "/webhdfs/v1/dir/with%20space%231");
    }

    #[test]
    fn test_build_url_rejects_relative_path() {
        let config = ClientConfig::default();
        assert!(matches!(
            build_url(&config, 0, Operation::Open, "relative", &[]),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            build_url(&config, 0, Operation::Open, "", &[]),
            Err(Error::InvalidPath(_))
        ));
    }
}
