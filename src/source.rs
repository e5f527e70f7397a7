//! Root template inputs
//!
//! Each root input is read on its own thread and handed back through a
//! one-slot channel. Results are collected in input order.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::template::resolver::{name_from_path, normalize};
use crate::template::TemplateError;

/// Name given to a root read from standard input
pub const STDIN_NAME: &str = "stdin";

/// An already-read root template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSource {
    /// Template name the root is registered under
    pub name: String,
    /// Absolute path; its directory anchors relative imports
    pub path: PathBuf,
    pub text: String,
}

impl RootSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Make `path` absolute against the current directory and normalize it
pub fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    Ok(normalize(&std::env::current_dir()?.join(path)))
}

fn spawn_read<F>(read: F) -> Receiver<io::Result<String>>
where
    F: FnOnce() -> io::Result<String> + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    thread::spawn(move || {
        // The receiver may have given up after a timeout
        let _ = tx.send(read());
    });
    rx
}

fn wait(
    rx: Receiver<io::Result<String>>,
    path: &Path,
    timeout: Option<Duration>,
) -> Result<String, TemplateError> {
    let unavailable = |source: io::Error| TemplateError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    };

    let received = match timeout {
        Some(limit) => rx.recv_timeout(limit).map_err(|e| match e {
            RecvTimeoutError::Timeout => {
                warn!(path = %path.display(), ?limit, "timed out reading template");
                io::Error::new(io::ErrorKind::TimedOut, "timed out reading template")
            }
            RecvTimeoutError::Disconnected => {
                io::Error::new(io::ErrorKind::BrokenPipe, "reader thread exited")
            }
        }),
        None => rx
            .recv()
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "reader thread exited")),
    };

    received.map_err(unavailable)?.map_err(unavailable)
}

/// Read every file concurrently; the result keeps the order of `paths`
pub fn read_files(paths: &[PathBuf], timeout: Option<Duration>) -> Result<Vec<RootSource>, TemplateError> {
    let pending = paths
        .iter()
        .map(|path| -> Result<_, TemplateError> {
            let path = absolute(path).map_err(|source| TemplateError::SourceUnavailable {
                path: path.clone(),
                source,
            })?;
            let name = name_from_path(&path).ok_or_else(|| TemplateError::SourceUnavailable {
                path: path.clone(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            })?;
            let target = path.clone();
            let rx = spawn_read(move || std::fs::read_to_string(target));
            Ok((name, path, rx))
        })
        .collect::<Result<Vec<_>, _>>()?;

    pending
        .into_iter()
        .map(|(name, path, rx)| -> Result<RootSource, TemplateError> {
            let text = wait(rx, &path, timeout)?;
            debug!(name, path = %path.display(), bytes = text.len(), "read root template");
            Ok(RootSource { name, path, text })
        })
        .collect()
}

/// Read a root template from standard input
pub fn read_stdin(timeout: Option<Duration>) -> Result<RootSource, TemplateError> {
    let path = absolute(Path::new(STDIN_NAME)).map_err(|source| TemplateError::SourceUnavailable {
        path: PathBuf::from(STDIN_NAME),
        source,
    })?;
    let rx = spawn_read(|| {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        Ok(text)
    });
    let text = wait(rx, &path, timeout)?;
    Ok(RootSource::new(STDIN_NAME, path, text))
}
