use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use webhdfs::{ClientConfig, Scheme};

#[derive(Debug, Parser)]
#[command(name = "webhdfs", version = env!("CARGO_PKG_VERSION"), about = "Talk to HDFS over WebHDFS", long_about = None, propagate_version = true)]
pub struct App {
    #[command(flatten)]
    pub conn: Connection,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Commands,
}

/// Where to connect; flags override the config file.
#[derive(Debug, Args)]
pub struct Connection {
    /// TOML file with a `ClientConfig`
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Comma-separated namenodes, each optionally `host:port`
    #[arg(long, global = true)]
    pub hosts: Option<String>,

    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// WebHDFS base path
    #[arg(long, global = true)]
    pub base_path: Option<String>,

    #[arg(long, global = true)]
    pub https: bool,

    /// Sent as `user.name`
    #[arg(short, long, global = true)]
    pub user: Option<String>,
}

impl Connection {
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ClientConfig::default(),
        };

        if let Some(hosts) = &self.hosts {
            config = config.hosts(hosts);
        }
        if let Some(port) = self.port {
            config = config.port(port);
        }
        if let Some(path) = &self.base_path {
            config = config.path(path.as_str());
        }
        if self.https {
            config = config.scheme(Scheme::Https);
        }
        if let Some(user) = &self.user {
            config = config.user(user.as_str());
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print a file to stdout
    #[command(name = "cat")]
    Cat { path: String },

    /// Download a file
    #[command(name = "get")]
    Get {
        path:   String,
        dest:   PathBuf,
        #[arg(long)]
        offset: Option<u64>,
        #[arg(long)]
        length: Option<u64>,
    },

    /// Upload a local file, or stdin with `-`
    #[command(name = "put")]
    Put {
        source:       PathBuf,
        path:         String,
        /// Fail if the file exists
        #[arg(long)]
        no_overwrite: bool,
        #[arg(long)]
        permission:   Option<String>,
        #[arg(long)]
        replication:  Option<u16>,
    },

    /// Append a local file, or stdin with `-`
    #[command(name = "append")]
    Append { source: PathBuf, path: String },

    /// List a directory
    #[command(alias = "list", name = "ls")]
    Ls { path: String },

    #[command(name = "stat")]
    Stat { path: String },

    #[command(name = "mkdir")]
    Mkdir {
        path:       String,
        #[arg(long, default_value = "0777")]
        permission: String,
    },

    #[command(alias = "remove", name = "rm")]
    Rm {
        path:      String,
        #[arg(short, long)]
        recursive: bool,
    },

    #[command(alias = "rename", name = "mv")]
    Mv { from: String, to: String },

    #[command(name = "chmod")]
    Chmod { mode: String, path: String },

    /// Change owner, given as `owner[:group]`
    #[command(name = "chown")]
    Chown { owner: String, path: String },

    /// Create `link` pointing at `target`
    #[command(name = "ln")]
    Ln {
        target:  String,
        link:    String,
        #[arg(short, long)]
        parents: bool,
    },

    /// Exit with status 1 if the path does not exist
    #[command(name = "test")]
    Test { path: String },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_app_definition() { App::command().debug_assert(); }

    #[test]
    fn test_flags_override_defaults() {
        let app = App::parse_from([
            "webhdfs",
            "--hosts",
            "nn1,nn2:9870",
            "--port",
            "50070",
            "-u",
            "hdfs",
            "stat",
            "/tmp",
        ]);
        let config = app.conn.client_config().unwrap();
        assert_eq!(config.hosts, ["nn1", "nn2:9870"]);
        assert_eq!(config.user.as_deref(), Some("hdfs"));
        assert!(matches!(app.cmd, Commands::Stat { ref path } if path == "/tmp"));
    }

    #[test]
    fn test_verbose_counts() {
        let app = App::parse_from(["webhdfs", "-vv", "ls", "/"]);
        assert_eq!(app.verbose, 2);
    }
}
