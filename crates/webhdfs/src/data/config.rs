//! Client configuration.
//!
//! [`ClientConfig`] is built once and never mutated afterwards. It can be assembled
//! with the builder-style setters or loaded from TOML:
//!
//! ```toml
//! hosts = "nn1.example.com,nn2.example.com"
//! port = 9870
//! path = "/webhdfs/v1"
//! user = "hdfs"
//!
//! [timeouts]
//! redirect = 10
//! read = 30.5
//!
//! [headers]
//! X-Request-Source = "etl"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 50070;
pub const DEFAULT_PATH: &str = "/webhdfs/v1";

/// URL scheme used to reach the namenodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Time bounds applied by the transport and the transfer pipelines.
///
/// Durations are written as (fractional) seconds in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// TCP connect timeout for every request.
    #[serde(deserialize_with = "secs")]
    pub connect:  Duration,
    /// How long to wait for response headers on either hop.
    ///
    /// Covers the namenode's answer and the datanode's answer to a download. For an
    /// upload the datanode is given this long once the body has been sent in full.
    #[serde(deserialize_with = "secs")]
    pub redirect: Duration,
    /// How long a download may sit idle between two chunks.
    #[serde(deserialize_with = "secs")]
    pub read:     Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect:  Duration::from_secs(30),
            redirect: Duration::from_secs(30),
            read:     Duration::from_secs(60),
        }
    }
}

/// Field names of the JSON error envelope returned by the server.
///
/// Hadoop answers `{"RemoteException": {"exception": ..., "message": ..., "javaClassName": ...}}`;
/// compatible servers that rename these fields can be matched here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ErrorSchema {
    pub envelope:        String,
    pub message:         String,
    pub exception:       String,
    pub java_class_name: String,
}

impl Default for ErrorSchema {
    fn default() -> Self {
        Self {
            envelope:        "RemoteException".to_string(),
            message:         "message".to_string(),
            exception:       "exception".to_string(),
            java_class_name: "javaClassName".to_string(),
        }
    }
}

/// A host entry split into name and optional per-host port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddr<'a> {
    pub name: &'a str,
    pub port: Option<u16>,
}

/// Split `host`, `host:port`, `[v6]` or `[v6]:port`.
pub fn parse_host(entry: &str) -> Result<HostAddr<'_>> {
    let entry = entry.trim();
    if entry.is_empty() {
        return Err(Error::InvalidConfig("host entry is empty".to_string()));
    }

    let invalid_port = |port: &str| Error::InvalidConfig(format!("invalid port {port:?} in host {entry:?}"));

    if let Some(rest) = entry.strip_prefix('[') {
        let (name, tail) = rest
            .split_once(']')
            .ok_or_else(|| Error::InvalidConfig(format!("unterminated IPv6 host {entry:?}")))?;
        let port = match tail.strip_prefix(':') {
            Some(port) => Some(port.parse().map_err(|_| invalid_port(port))?),
            None if tail.is_empty() => None,
            None => return Err(Error::InvalidConfig(format!("invalid host {entry:?}"))),
        };
        return Ok(HostAddr {
            name: &entry[..name.len() + 2],
            port,
        });
    }

    match entry.split_once(':') {
        Some((name, port)) if !name.is_empty() && !port.contains(':') => Ok(HostAddr {
            name,
            port: Some(port.parse().map_err(|_| invalid_port(port))?),
        }),
        Some(_) => Err(Error::InvalidConfig(format!("invalid host {entry:?}"))),
        None => Ok(HostAddr {
            name: entry,
            port: None,
        }),
    }
}

/// Immutable client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Candidate namenodes, in failover order. Accepts `"a,b"` or `["a", "b"]`.
    #[serde(deserialize_with = "host_list")]
    pub hosts:         Vec<String>,
    pub port:          u16,
    /// Prefix prepended to every resource path.
    pub path:          String,
    pub scheme:        Scheme,
    /// Sent as `user.name`; omitted when unset.
    pub user:          Option<String>,
    /// Extra headers sent with every request.
    pub headers:       BTreeMap<String, String>,
    /// Reuse pooled connections between requests.
    pub keep_alive:    bool,
    pub timeouts:      Timeouts,
    pub error_schema:  ErrorSchema,
    /// Chunks an upload may queue before the writer waits on the datanode.
    pub upload_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hosts:         vec![DEFAULT_HOST.to_string()],
            port:          DEFAULT_PORT,
            path:          DEFAULT_PATH.to_string(),
            scheme:        Scheme::Http,
            user:          None,
            headers:       BTreeMap::new(),
            keep_alive:    true,
            timeouts:      Timeouts::default(),
            error_schema:  ErrorSchema::default(),
            upload_buffer: 16,
        }
    }
}

impl ClientConfig {
    /// Start from the defaults with the given comma-separated host list.
    pub fn new(hosts: &str) -> Self {
        Self {
            hosts: split_hosts(hosts),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check the invariants every request relies on.
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(Error::InvalidConfig("host list is empty".to_string()));
        }
        if !self.path.is_empty() && !self.path.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "base path {:?} must start with '/'",
                self.path
            )));
        }
        if self.upload_buffer == 0 {
            return Err(Error::InvalidConfig("upload_buffer must be at least 1".to_string()));
        }

        for host in &self.hosts {
            let addr = parse_host(host)?;
            let port = addr.port.unwrap_or(self.port);
            let base = format!("{}://{}:{}/", self.scheme, addr.name, port);
            Url::parse(&base)
                .map_err(|e| Error::InvalidConfig(format!("host {host:?} is not usable: {e}")))?;
        }

        Ok(())
    }

    #[must_use]
    pub fn hosts(mut self, hosts: &str) -> Self {
        self.hosts = split_hosts(hosts);
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    #[must_use]
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn error_schema(mut self, error_schema: ErrorSchema) -> Self {
        self.error_schema = error_schema;
        self
    }

    #[must_use]
    pub fn upload_buffer(mut self, upload_buffer: usize) -> Self {
        self.upload_buffer = upload_buffer;
        self
    }
}

fn split_hosts(hosts: &str) -> Vec<String> { hosts.split(',').map(|h| h.trim().to_string()).collect() }

fn host_list<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HostList {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match HostList::deserialize(d)? {
        HostList::Joined(joined) => split_hosts(&joined),
        HostList::List(list) => list.iter().flat_map(|h| split_hosts(h)).collect(),
    })
}

fn secs<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Duration, D::Error> {
    let secs = f64::deserialize(d)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}
