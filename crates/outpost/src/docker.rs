//! Container engine collaborator.
//!
//! The engine only needs three operations from the container runtime; they
//! are shell-outs to the `docker` CLI (or a compatible binary) with captured
//! output, behind a trait so tests can substitute an in-memory engine.

use std::net::TcpListener;
use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum DockerError {
    #[error("command `{command}` exited with {code}\nstdout: {stdout}\nstderr: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The narrow container-runtime surface the workflows consume.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Build `<name>:latest` from a Dockerfile within a context directory.
    async fn build_image(
        &self,
        name: &str,
        dockerfile: &Path,
        context_dir: &Path,
    ) -> Result<(), DockerError>;

    /// Run a detached container publishing `host_port` -> `container_port`.
    async fn run_container(
        &self,
        name: &str,
        host_port: u16,
        container_port: u16,
    ) -> Result<(), DockerError>;

    /// Stop and remove the named container.
    async fn stop_and_remove(&self, name: &str) -> Result<(), DockerError>;
}

/// Shell-out implementation against the docker CLI.
pub struct DockerCli {
    bin: String,
}

impl DockerCli {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn exec(&self, args: &[&str]) -> Result<Output, DockerError> {
        let output = Command::new(&self.bin).args(args).output().await?;
        let command = format!("{} {}", self.bin, args.join(" "));
        let code = output.status.code().unwrap_or(-1);
        tracing::debug!("ran `{}`, exit code {}", command, code);

        if !output.status.success() {
            return Err(DockerError::CommandFailed {
                command,
                code,
                stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Like `exec` but a non-zero exit only logs a warning. Used for the
    /// cleanup commands that fail when there is nothing to clean up.
    async fn exec_lenient(&self, args: &[&str]) {
        if let Err(e) = self.exec(args).await {
            tracing::warn!("{}", e);
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn build_image(
        &self,
        name: &str,
        dockerfile: &Path,
        context_dir: &Path,
    ) -> Result<(), DockerError> {
        let tag = format!("{name}:latest");
        // Drop any previous image for this app so the tag always points at
        // the fresh build.
        self.exec_lenient(&["rmi", "--force", &tag]).await;

        tracing::info!("building image {}", tag);
        self.exec(&[
            "build",
            "-t",
            &tag,
            "-f",
            &dockerfile.display().to_string(),
            "--no-cache",
            &context_dir.display().to_string(),
        ])
        .await?;
        tracing::info!("image {} built", tag);
        Ok(())
    }

    async fn run_container(
        &self,
        name: &str,
        host_port: u16,
        container_port: u16,
    ) -> Result<(), DockerError> {
        // A stale container with the same name blocks `docker run`.
        self.stop_and_remove(name).await?;

        tracing::info!("starting container {} on port {}", name, host_port);
        self.exec(&[
            "run",
            "--name",
            name,
            "-d",
            "-p",
            &format!("{host_port}:{container_port}"),
            &format!("{name}:latest"),
        ])
        .await?;
        Ok(())
    }

    async fn stop_and_remove(&self, name: &str) -> Result<(), DockerError> {
        self.exec_lenient(&["stop", name]).await;
        self.exec_lenient(&["rm", name]).await;
        Ok(())
    }
}

/// Pick the host port to publish on: the requested port when it is free,
/// otherwise one assigned by the OS.
pub fn free_host_port(requested: u16) -> std::io::Result<u16> {
    if TcpListener::bind(("127.0.0.1", requested)).is_ok() {
        return Ok(requested);
    }
    tracing::debug!("port {} is taken, picking a free one", requested);
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}
