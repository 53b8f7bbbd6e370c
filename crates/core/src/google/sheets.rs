//! Read-only Google Sheets client.
//!
//! Reads one worksheet with the Sheets v4 `values` API and turns it into a
//! [`GradeTable`]: the first row is the header, every later row a record.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use yup_oauth2::authenticator::DefaultAuthenticator;

use crate::config::{SheetsConfig, SheetsCredentials};
use crate::errors::SheetsError;
use crate::models::{CellValue, GradeRow, GradeTable};

/// Scopes requested for the service account.
pub const SHEETS_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
];

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

enum TokenSource {
    ServiceAccount(Box<DefaultAuthenticator>),
    Static(String),
}

/// Asynchronous Sheets API client bound to one spreadsheet.
pub struct SheetsClient {
    http: reqwest::Client,
    api_url: String,
    spreadsheet_id: String,
    worksheet: Option<String>,
    tokens: TokenSource,
}

impl SheetsClient {
    /// Build a client from configuration, loading service-account
    /// credentials if configured.
    pub async fn from_config(config: &SheetsConfig) -> Result<Self, SheetsError> {
        let tokens = match config.credentials() {
            Some(SheetsCredentials::KeyFile(path)) => {
                info!(path = %path.display(), "loading service account key");
                let key = yup_oauth2::read_service_account_key(&path)
                    .await
                    .map_err(|e| {
                        SheetsError::Credentials(format!(
                            "cannot read service account key at '{}': {}",
                            path.display(),
                            e
                        ))
                    })?;
                TokenSource::ServiceAccount(Box::new(service_account(key).await?))
            }
            Some(SheetsCredentials::KeyJson(json)) => {
                let key = yup_oauth2::parse_service_account_key(json.as_bytes()).map_err(|e| {
                    SheetsError::Credentials(format!("invalid service account key: {}", e))
                })?;
                TokenSource::ServiceAccount(Box::new(service_account(key).await?))
            }
            Some(SheetsCredentials::AccessToken(token)) => {
                debug!("using static access token for Sheets");
                TokenSource::Static(token)
            }
            None => {
                return Err(SheetsError::Credentials(
                    "no spreadsheet credentials configured".into(),
                ))
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(super::USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let api_url = config.api_url.trim_end_matches('/').to_string();
        info!(api_url = %api_url, spreadsheet_id = %config.spreadsheet_id, "created SheetsClient");
        Ok(Self {
            http,
            api_url,
            spreadsheet_id: config.spreadsheet_id.clone(),
            worksheet: config.worksheet.clone(),
            tokens,
        })
    }

    async fn bearer(&self) -> Result<String, SheetsError> {
        match &self.tokens {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount(auth) => {
                let token = auth
                    .token(&SHEETS_SCOPES)
                    .await
                    .map_err(|e| SheetsError::Credentials(e.to_string()))?;
                token
                    .token()
                    .map(str::to_string)
                    .ok_or_else(|| SheetsError::Credentials("service account returned no token".into()))
            }
        }
    }

    fn spreadsheet_url(&self, tail: &[&str]) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.api_url).map_err(|e| SheetsError::Parse(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::Parse(format!("'{}' cannot be a base URL", self.api_url)))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.spreadsheet_id)
            .extend(tail);
        Ok(url)
    }

    /// Title of the first worksheet in the spreadsheet.
    #[instrument(skip(self))]
    pub async fn first_worksheet_title(&self) -> Result<String, SheetsError> {
        let url = self.spreadsheet_url(&[])?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(self.bearer().await?)
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .await?;
        let what = format!("spreadsheet {}", self.spreadsheet_id);
        let resp = Self::check_response(resp, &what).await?;
        let meta: SpreadsheetMetadata = resp
            .json()
            .await
            .map_err(|e| SheetsError::Parse(e.to_string()))?;

        let title = meta
            .sheets
            .into_iter()
            .next()
            .map(|s| s.properties.title)
            .ok_or(SheetsError::NoWorksheet)?;
        debug!(title = %title, "resolved first worksheet");
        Ok(title)
    }

    /// Cell values of a range as the sheet displays them (`90%`, dates,
    /// `TRUE`), so grades read the same as in the spreadsheet.
    #[instrument(skip(self))]
    pub async fn fetch_values(&self, range: &str) -> Result<Vec<Vec<serde_json::Value>>, SheetsError> {
        let url = self.spreadsheet_url(&["values", range])?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(self.bearer().await?)
            .query(&[
                ("valueRenderOption", "FORMATTED_VALUE"),
                ("majorDimension", "ROWS"),
            ])
            .send()
            .await?;
        let what = format!("range {} of spreadsheet {}", range, self.spreadsheet_id);
        let resp = Self::check_response(resp, &what).await?;
        let body: ValueRange = resp
            .json()
            .await
            .map_err(|e| SheetsError::Parse(e.to_string()))?;
        debug!(rows = body.values.len(), "fetched values");
        Ok(body.values)
    }

    /// Fetch the configured (or first) worksheet as records.
    pub async fn fetch_table(&self) -> Result<GradeTable, SheetsError> {
        let title = match &self.worksheet {
            Some(title) => title.clone(),
            None => self.first_worksheet_title().await?,
        };
        let values = self.fetch_values(&quote_sheet_title(&title)).await?;
        let table = records_from_values(&values)?;
        info!(worksheet = %title, records = table.len(), "grade table loaded");
        Ok(table)
    }

    async fn check_response(
        resp: reqwest::Response,
        what: &str,
    ) -> Result<reqwest::Response, SheetsError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        match status.as_u16() {
            401 | 403 => Err(SheetsError::AccessDenied {
                status: status.as_u16(),
            }),
            404 => Err(SheetsError::NotFound(what.to_string())),
            code => Err(SheetsError::Api {
                status: code,
                body: resp.text().await.unwrap_or_else(|_| format!("HTTP {}", status)),
            }),
        }
    }
}

async fn service_account(
    key: yup_oauth2::ServiceAccountKey,
) -> Result<DefaultAuthenticator, SheetsError> {
    debug!(client_email = %key.client_email, "building service account authenticator");
    yup_oauth2::ServiceAccountAuthenticator::builder(key)
        .build()
        .await
        .map_err(|e| SheetsError::Credentials(e.to_string()))
}

/// A1 range covering a whole worksheet.
fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Turn a header row plus data rows into records.
///
/// Short rows are padded with empty cells, cells beyond the header are
/// dropped, fully empty rows are skipped, and columns with an empty header
/// are ignored.
pub fn records_from_values(values: &[Vec<serde_json::Value>]) -> Result<GradeTable, SheetsError> {
    let Some((header_row, data_rows)) = values.split_first() else {
        return Ok(GradeTable::new());
    };

    let mut headers: Vec<Option<String>> = Vec::with_capacity(header_row.len());
    for cell in header_row {
        let name = CellValue::from_json(cell).to_string();
        if name.is_empty() {
            headers.push(None);
            continue;
        }
        if headers.iter().flatten().any(|h| *h == name) {
            return Err(SheetsError::DuplicateHeader(name));
        }
        headers.push(Some(name));
    }

    let mut table = GradeTable::with_capacity(data_rows.len());
    for raw in data_rows {
        let mut row = GradeRow::new();
        let mut any_value = false;
        for (i, header) in headers.iter().enumerate() {
            let Some(name) = header else { continue };
            let value = raw.get(i).map(CellValue::from_json).unwrap_or(CellValue::Empty);
            any_value |= !value.is_empty();
            row.push(name.clone(), value);
        }
        if any_value {
            table.push(row);
        }
    }
    Ok(table)
}
