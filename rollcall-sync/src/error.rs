//! Error types for rollcall-sync.

use thiserror::Error;

/// Failures reported by a [`RosterSource`](crate::RosterSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The configured guild is not visible to the bot.
    #[error("guild {guild_id} not found")]
    GuildNotFound { guild_id: u64 },

    /// Any other platform or transport failure.
    #[error("chat platform error: {0}")]
    Platform(String),
}

/// Failures reported by a [`SheetBackend`](crate::SheetBackend).
#[derive(Debug, Error)]
pub enum SheetError {
    /// Service-account credential could not be parsed.
    #[error("invalid service-account credentials: {0}")]
    Credentials(#[source] serde_json::Error),

    /// JWT signing failed (usually a malformed private key).
    #[error("failed to sign service-account assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Token endpoint rejected the assertion.
    #[error("token exchange failed: {0}")]
    Auth(String),

    /// Network or TLS failure before a response arrived.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("HTTP {status} from {url}: {body}")]
    Api {
        status: u16,
        url: String,
        body: String,
    },

    #[error("invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("spreadsheet '{title}' not found")]
    SpreadsheetNotFound { title: String },

    #[error("worksheet '{title}' not found")]
    WorksheetNotFound { title: String },

    /// Free-form failure from a non-Google backend.
    #[error("sheet backend error: {0}")]
    Backend(String),
}

/// All errors that abort a reconciliation pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reading the reference worksheet failed; nothing was written.
    #[error("reference worksheet read failed: {0}")]
    Reference(#[source] SheetError),

    /// Fetching the member roster failed; nothing was written.
    #[error("roster fetch failed: {0}")]
    Roster(#[from] SourceError),

    /// A column write failed. Earlier ranges of the same pass stay written.
    #[error("write to {range} failed after {completed} of {total} ranges: {source}")]
    Write {
        range: String,
        completed: usize,
        total: usize,
        #[source]
        source: SheetError,
    },
}
