use std::path::PathBuf;

use thiserror::Error;

/// Error surface for daemon startup and runtime tasks.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("spreadsheet error: {0}")]
    Sheet(#[from] rollcall_sync::SheetError),

    #[error("sync error: {0}")]
    Sync(#[from] rollcall_sync::SyncError),

    #[error("discord error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("daemon runtime error: {0}")]
    Protocol(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}

/// `err` followed by each `source()` in its chain, joined with `: `.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !rendered.ends_with(&cause_text) {
            rendered.push_str(": ");
            rendered.push_str(&cause_text);
        }
        source = cause.source();
    }
    rendered
}
