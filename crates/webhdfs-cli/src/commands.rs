use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tokio::io::{self, AsyncRead, AsyncWriteExt};
use tracing::info;
use webhdfs::{FileStatus, FileType, HttpClient, MkdirOptions, OpenOptions, WebHdfsClient, WriteOptions};

use crate::app::Commands;

pub async fn run<C: HttpClient>(client: &WebHdfsClient<C>, cmd: Commands) -> Result<ExitCode> {
    match cmd {
        Commands::Cat { path } => {
            let mut stdout = io::stdout();
            client
                .open_download(&path, OpenOptions::default())?
                .copy_to(&mut stdout)
                .await?;
        }
        Commands::Get {
            path,
            dest,
            offset,
            length,
        } => {
            let mut options = OpenOptions::default();
            options.offset = offset;
            options.length = length;

            let mut file = tokio::fs::File::create(&dest)
                .await
                .with_context(|| format!("failed to create {}", dest.display()))?;
            let bytes = client.open_download(&path, options)?.copy_to(&mut file).await?;
            info!(path = %path, dest = %dest.display(), bytes, "downloaded");
        }
        Commands::Put {
            source,
            path,
            no_overwrite,
            permission,
            replication,
        } => {
            let mut options = WriteOptions::default().overwrite(!no_overwrite);
            if let Some(permission) = permission {
                options = options.permission(permission);
            }
            if let Some(replication) = replication {
                options = options.replication(replication);
            }
            upload(client, &source, &path, false, options).await?;
        }
        Commands::Append { source, path } => {
            upload(client, &source, &path, true, WriteOptions::default()).await?;
        }
        Commands::Ls { path } => {
            let mut out = io::stdout();
            for status in client.readdir(&path).await? {
                out.write_all(format_status(&status).as_bytes()).await?;
            }
            out.flush().await?;
        }
        Commands::Stat { path } => {
            let status = client.stat(&path).await?;
            let mut out = io::stdout();
            out.write_all(format_status(&status).as_bytes()).await?;
            out.flush().await?;
        }
        Commands::Mkdir { path, permission } => {
            if !client.mkdir(&path, MkdirOptions::default().permission(permission)).await? {
                anyhow::bail!("namenode refused to create {path}");
            }
        }
        Commands::Rm { path, recursive } => {
            if !client.unlink(&path, recursive).await? {
                anyhow::bail!("{path}: no such file or directory");
            }
        }
        Commands::Mv { from, to } => {
            if !client.rename(&from, &to).await? {
                anyhow::bail!("failed to rename {from} to {to}");
            }
        }
        Commands::Chmod { mode, path } => client.chmod(&path, &mode).await?,
        Commands::Chown { owner, path } => {
            let (owner, group) = owner.split_once(':').unwrap_or((owner.as_str(), ""));
            client.chown(&path, owner, group).await?;
        }
        Commands::Ln { target, link, parents } => client.symlink(&target, &link, parents).await?,
        Commands::Test { path } => {
            if !client.exists(&path).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn upload<C: HttpClient>(
    client: &WebHdfsClient<C>,
    source: &Path,
    path: &str,
    append: bool,
    options: WriteOptions,
) -> Result<()> {
    let reader: Box<dyn AsyncRead + Unpin + Send> = if source == Path::new("-") {
        Box::new(io::stdin())
    } else {
        let file = tokio::fs::File::open(source)
            .await
            .with_context(|| format!("failed to open {}", source.display()))?;
        Box::new(file)
    };

    let outcome = client.upload_from(path, append, reader, options).await?;
    info!(path, bytes = outcome.bytes_written, location = ?outcome.location, "uploaded");
    Ok(())
}

fn format_status(status: &FileStatus) -> String {
    let kind = match status.ty {
        FileType::Directory => 'd',
        FileType::File => '-',
        FileType::Symlink => 'l',
    };
    let name = if status.path_suffix.is_empty() { "." } else { &status.path_suffix };
    format!(
        "{kind}{:>4} {:>3} {:<10} {:<12} {:>12} {:>14} {name}\n",
        status.permission, status.replication, status.owner, status.group, status.length, status.modification_time
    )
}
