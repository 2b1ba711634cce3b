//! Google Sheets v4 / Drive v3 backend over plain REST.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::error::SheetError;
use crate::sheets::auth::{ServiceAccountKey, TokenSource};
use crate::sheets::{SheetBackend, SheetTarget};

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// How the spreadsheet is located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetRef {
    /// Search Drive for a spreadsheet with this exact title.
    Title(String),
    /// Use this spreadsheet id directly.
    Id(String),
}

#[derive(Debug, Clone)]
pub struct GoogleSheetsConfig {
    pub spreadsheet: SpreadsheetRef,
    pub timeout: Duration,
    pub sheets_base: String,
    pub drive_base: String,
}

impl GoogleSheetsConfig {
    pub fn new(spreadsheet: SpreadsheetRef) -> Self {
        Self {
            spreadsheet,
            timeout: Duration::from_secs(30),
            sheets_base: SHEETS_API_BASE.to_string(),
            drive_base: DRIVE_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct OpenedSpreadsheet {
    id: String,
    first_sheet_title: String,
}

/// Spreadsheet access authenticated as a service account.
///
/// The spreadsheet id and first worksheet title are resolved on first use
/// and cached for the lifetime of the client.
#[derive(Debug)]
pub struct GoogleSheets {
    http: Client,
    tokens: TokenSource,
    config: GoogleSheetsConfig,
    opened: OnceCell<OpenedSpreadsheet>,
}

// --- wire types -------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    major_dimension: Option<String>,
    #[serde(default)]
    values: Vec<Vec<String>>,
}

// --- client -----------------------------------------------------------------

impl GoogleSheets {
    pub fn new(key: ServiceAccountKey, config: GoogleSheetsConfig) -> Result<Self, SheetError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            tokens: TokenSource::new(key),
            config,
            opened: OnceCell::new(),
        })
    }

    /// Parse the credential JSON blob and build a client.
    pub fn from_credentials_json(
        json: &str,
        config: GoogleSheetsConfig,
    ) -> Result<Self, SheetError> {
        Self::new(ServiceAccountKey::from_json(json)?, config)
    }

    pub fn service_account(&self) -> &str {
        self.tokens.client_email()
    }

    async fn opened(&self) -> Result<&OpenedSpreadsheet, SheetError> {
        self.opened.get_or_try_init(|| self.open()).await
    }

    async fn open(&self) -> Result<OpenedSpreadsheet, SheetError> {
        let id = match &self.config.spreadsheet {
            SpreadsheetRef::Id(id) => id.clone(),
            SpreadsheetRef::Title(title) => self.find_by_title(title).await?,
        };
        let first_sheet_title = self.first_sheet_title(&id).await?;
        tracing::info!(
            "opened spreadsheet {} (first worksheet '{}')",
            id,
            first_sheet_title
        );
        Ok(OpenedSpreadsheet {
            id,
            first_sheet_title,
        })
    }

    async fn find_by_title(&self, title: &str) -> Result<String, SheetError> {
        let url = api_url(&self.config.drive_base, &["files"])?;
        let query = drive_title_query(title);
        let token = self.tokens.bearer(&self.http).await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;
        let list: DriveFileList = check(response).await?.json().await?;
        list.files
            .into_iter()
            .next()
            .map(|file| file.id)
            .ok_or_else(|| SheetError::SpreadsheetNotFound {
                title: title.to_string(),
            })
    }

    async fn first_sheet_title(&self, id: &str) -> Result<String, SheetError> {
        let url = api_url(&self.config.sheets_base, &["spreadsheets", id])?;
        let token = self.tokens.bearer(&self.http).await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .await?;
        let meta: SpreadsheetMeta = check(response).await?.json().await?;
        meta.sheets
            .into_iter()
            .next()
            .map(|sheet| sheet.properties.title)
            .ok_or_else(|| SheetError::WorksheetNotFound {
                title: SheetTarget::First.to_string(),
            })
    }

    fn sheet_title<'a>(&self, opened: &'a OpenedSpreadsheet, sheet: &'a SheetTarget) -> &'a str {
        match sheet {
            SheetTarget::First => &opened.first_sheet_title,
            SheetTarget::Named(title) => title,
        }
    }
}

#[async_trait]
impl SheetBackend for GoogleSheets {
    async fn read_all(&self, sheet: &SheetTarget) -> Result<Vec<Vec<String>>, SheetError> {
        let opened = self.opened().await?;
        let range = quote_sheet_title(self.sheet_title(opened, sheet));
        let url = api_url(
            &self.config.sheets_base,
            &["spreadsheets", &opened.id, "values", &range],
        )?;
        let token = self.tokens.bearer(&self.http).await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
            if let SheetTarget::Named(title) = sheet {
                let body = response.text().await.unwrap_or_default();
                tracing::debug!("values read for '{}' rejected: {}", title, body);
                return Err(SheetError::WorksheetNotFound {
                    title: title.clone(),
                });
            }
        }

        let values: ValueRange = check(response).await?.json().await?;
        Ok(values.values)
    }

    async fn update(
        &self,
        sheet: &SheetTarget,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<(), SheetError> {
        let opened = self.opened().await?;
        let qualified = qualified_range(self.sheet_title(opened, sheet), range);
        let url = api_url(
            &self.config.sheets_base,
            &["spreadsheets", &opened.id, "values", &qualified],
        )?;
        let body = ValueRange {
            range: Some(qualified.clone()),
            major_dimension: Some("ROWS".to_string()),
            values,
        };
        let token = self.tokens.bearer(&self.http).await?;
        let response = self
            .http
            .put(url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await?;
        check(response).await?;
        tracing::debug!("updated {}", qualified);
        Ok(())
    }
}

// --- helpers ----------------------------------------------------------------

async fn check(response: Response) -> Result<Response, SheetError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(SheetError::Api {
        status: status.as_u16(),
        url,
        body,
    })
}

/// Append percent-encoded path segments to an API base URL.
pub(crate) fn api_url(base: &str, segments: &[&str]) -> Result<Url, SheetError> {
    let mut url = Url::parse(base).map_err(|e| SheetError::InvalidUrl(format!("{base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| SheetError::InvalidUrl(format!("{base}: cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// `'Team Sheets'`, with embedded quotes doubled.
pub(crate) fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

pub(crate) fn qualified_range(title: &str, range: &str) -> String {
    format!("{}!{}", quote_sheet_title(title), range)
}

/// Drive search expression for a non-trashed spreadsheet with this title.
pub(crate) fn drive_title_query(title: &str) -> String {
    let escaped = title.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{escaped}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false")
}
