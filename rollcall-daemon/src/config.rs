//! Environment-driven configuration.
//!
//! Every setting comes from an environment variable. The bot token may also
//! come from a plaintext token file. Missing or malformed required settings
//! are fatal: the daemon refuses to start.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use rollcall_sync::sheets::auth::ServiceAccountKey;
use rollcall_sync::sheets::SpreadsheetRef;
use rollcall_sync::SheetLayout;

pub const ENV_CREDENTIALS: &str = "GOOGLE_SHEET_CREDENTIALS";
pub const ENV_BOT_TOKEN: &str = "DISCORD_BOT_TOKEN";
pub const ENV_TOKEN_FILE: &str = "DISCORD_TOKEN_FILE";
pub const ENV_APP_ID: &str = "DISCORD_APP_ID";
pub const ENV_GUILD_ID: &str = "DISCORD_GUILD_ID";
pub const ENV_SPREADSHEET_TITLE: &str = "SPREADSHEET_TITLE";
pub const ENV_SPREADSHEET_ID: &str = "SPREADSHEET_ID";
pub const ENV_REFERENCE_WORKSHEET: &str = "REFERENCE_WORKSHEET";
pub const ENV_OVR_COLUMN: &str = "OVR_COLUMN";
pub const ENV_SYNC_INTERVAL: &str = "SYNC_INTERVAL_SECS";
pub const ENV_STARTUP_DELAY: &str = "STARTUP_DELAY_SECS";
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";

pub const DEFAULT_TOKEN_FILE: &str = "token.txt";
pub const DEFAULT_SPREADSHEET_TITLE: &str = "Lukas's World Cup™ 26 | Spreadsheet";
pub const DEFAULT_REFERENCE_WORKSHEET: &str = "Team Sheets";
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// Startup configuration failures. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("GOOGLE_SHEET_CREDENTIALS is not valid service-account JSON: {0}")]
    Credentials(#[source] serde_json::Error),

    #[error("failed to read bot token file {path}: {source}")]
    TokenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything the daemon needs, resolved once at startup.
#[derive(Clone)]
pub struct DaemonConfig {
    pub service_account: ServiceAccountKey,
    pub bot_token: String,
    pub application_id: u64,
    pub guild_id: u64,
    pub spreadsheet: SpreadsheetRef,
    pub reference_worksheet: String,
    pub ovr_column: Option<String>,
    pub sync_interval: Duration,
    pub startup_delay: Duration,
    pub host: String,
    pub port: u16,
}

impl fmt::Debug for DaemonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonConfig")
            .field("service_account", &self.service_account)
            .field("bot_token", &"<redacted>")
            .field("application_id", &self.application_id)
            .field("guild_id", &self.guild_id)
            .field("spreadsheet", &self.spreadsheet)
            .field("reference_worksheet", &self.reference_worksheet)
            .field("ovr_column", &self.ovr_column)
            .field("sync_interval", &self.sync_interval)
            .field("startup_delay", &self.startup_delay)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl DaemonConfig {
    /// Read configuration from the process environment, looking for the
    /// fallback token file in the current directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_lookup(|var| std::env::var(var).ok(), &cwd)
    }

    /// Read configuration through `lookup`, resolving a relative token file
    /// against `base_dir`.
    pub fn from_lookup<F>(lookup: F, base_dir: &Path) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let credentials = get(ENV_CREDENTIALS).ok_or(ConfigError::Missing(ENV_CREDENTIALS))?;
        let service_account: ServiceAccountKey =
            serde_json::from_str(&credentials).map_err(ConfigError::Credentials)?;

        let bot_token = resolve_bot_token(&get, base_dir)?;
        let application_id = parse_id(ENV_APP_ID, get(ENV_APP_ID))?;
        let guild_id = parse_id(ENV_GUILD_ID, get(ENV_GUILD_ID))?;

        let spreadsheet = match get(ENV_SPREADSHEET_ID) {
            Some(id) => SpreadsheetRef::Id(id.trim().to_string()),
            None => SpreadsheetRef::Title(
                get(ENV_SPREADSHEET_TITLE).unwrap_or_else(|| DEFAULT_SPREADSHEET_TITLE.to_string()),
            ),
        };

        let ovr_column = get(ENV_OVR_COLUMN)
            .map(|column| parse_column(&column))
            .transpose()?;

        Ok(Self {
            service_account,
            bot_token,
            application_id,
            guild_id,
            spreadsheet,
            reference_worksheet: get(ENV_REFERENCE_WORKSHEET)
                .unwrap_or_else(|| DEFAULT_REFERENCE_WORKSHEET.to_string()),
            ovr_column,
            sync_interval: parse_secs(ENV_SYNC_INTERVAL, get(ENV_SYNC_INTERVAL))?
                .unwrap_or(DEFAULT_SYNC_INTERVAL),
            startup_delay: parse_secs(ENV_STARTUP_DELAY, get(ENV_STARTUP_DELAY))?
                .unwrap_or(DEFAULT_STARTUP_DELAY),
            host: get(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: match get(ENV_PORT) {
                Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
                    var: ENV_PORT,
                    reason: format!("'{raw}': {e}"),
                })?,
                None => DEFAULT_PORT,
            },
        })
    }

    /// Sheet geography for this configuration.
    pub fn layout(&self) -> SheetLayout {
        let layout = SheetLayout::default().with_reference_sheet(self.reference_worksheet.clone());
        match &self.ovr_column {
            Some(column) => layout.with_ovr_column(column.clone()),
            None => layout,
        }
    }
}

/// Environment token first, then an explicit token file, then `token.txt`.
fn resolve_bot_token<G>(get: &G, base_dir: &Path) -> Result<String, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    if let Some(token) = get(ENV_BOT_TOKEN) {
        return Ok(token.trim().to_string());
    }

    let (path, explicit) = match get(ENV_TOKEN_FILE) {
        Some(path) => (base_dir.join(path.trim()), true),
        None => (base_dir.join(DEFAULT_TOKEN_FILE), false),
    };
    if !explicit && !path.exists() {
        return Err(ConfigError::Missing(ENV_BOT_TOKEN));
    }

    let token = fs::read_to_string(&path)
        .map_err(|source| ConfigError::TokenFile {
            path: path.clone(),
            source,
        })?
        .trim()
        .to_string();
    if token.is_empty() {
        return Err(ConfigError::Invalid {
            var: ENV_TOKEN_FILE,
            reason: format!("{} is empty", path.display()),
        });
    }
    Ok(token)
}

fn parse_id(var: &'static str, raw: Option<String>) -> Result<u64, ConfigError> {
    let raw = raw.ok_or(ConfigError::Missing(var))?;
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            var,
            reason: "id must be non-zero".to_string(),
        }),
        Ok(id) => Ok(id),
        Err(e) => Err(ConfigError::Invalid {
            var,
            reason: format!("'{raw}': {e}"),
        }),
    }
}

fn parse_secs(var: &'static str, raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    raw.map(|raw| {
        raw.trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid {
                var,
                reason: format!("'{raw}': {e}"),
            })
    })
    .transpose()
}

fn parse_column(raw: &str) -> Result<String, ConfigError> {
    let column = raw.trim().to_ascii_uppercase();
    if column.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(column)
    } else {
        Err(ConfigError::Invalid {
            var: ENV_OVR_COLUMN,
            reason: format!("'{raw}' is not a column letter"),
        })
    }
}
