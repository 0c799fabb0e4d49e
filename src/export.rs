use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;

use crate::ai::ERROR_PREFIX;
use crate::config::SheetsConfig;
use crate::models::ApplicationRecord;
use crate::store::ApplicationStore;

/// Publishes the full table. Returns a reference (path or URL) or an `Error:` string.
pub trait ExportTarget {
    fn export(&self, records: &[ApplicationRecord]) -> String;
}

fn error_string(target: &str, e: anyhow::Error) -> String {
    warn!("{} export failed: {:#}", target, e);
    format!("{} {:#}", ERROR_PREFIX, e)
}

/// Header row followed by one row of cell strings per record.
pub fn table_rows(records: &[ApplicationRecord]) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(ApplicationStore::header().iter().map(|c| c.to_string()).collect());
    for r in records {
        rows.push(vec![
            r.title.clone(),
            r.company.clone(),
            r.location.clone().unwrap_or_default(),
            r.link.clone(),
            r.cover_letter_path.clone(),
            r.status.to_string(),
            r.match_score.map(|s| s.to_string()).unwrap_or_default(),
            r.deadline.map(|d| d.to_string()).unwrap_or_default(),
        ]);
    }
    rows
}

pub struct CsvExport {
    path: PathBuf,
}

impl CsvExport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ExportTarget for CsvExport {
    fn export(&self, records: &[ApplicationRecord]) -> String {
        match ApplicationStore::new(&self.path).overwrite(records) {
            Ok(()) => {
                info!("exported {} rows to {}", records.len(), self.path.display());
                self.path.display().to_string()
            }
            Err(e) => error_string("CSV", e.into()),
        }
    }
}

const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
    spreadsheet_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenFile {
    access_token: Option<String>,
}

pub struct SheetsExport {
    access_token: String,
    title: String,
    client: reqwest::blocking::Client,
}

impl SheetsExport {
    pub fn new(access_token: String, title: String) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            access_token,
            title,
            client,
        }
    }

    /// Token from config/env first, then an `access_token` field in the credential file.
    pub fn from_config(config: &SheetsConfig) -> Result<Self> {
        if let Some(token) = config.access_token.clone().filter(|t| !t.trim().is_empty()) {
            return Ok(Self::new(token, config.sheet_name.clone()));
        }

        let path = &config.credentials_file;
        let raw = std::fs::read_to_string(path).with_context(|| {
            format!(
                "No Sheets access token. Set GOOGLE_SHEETS_TOKEN or provide {}",
                path.display()
            )
        })?;
        let token_file: TokenFile = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid credential file: {}", path.display()))?;
        let token = token_file
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "{} has no access_token; set GOOGLE_SHEETS_TOKEN to an OAuth access token",
                    path.display()
                )
            })?;

        Ok(Self::new(token, config.sheet_name.clone()))
    }

    fn check(response: reqwest::blocking::Response, action: &str) -> Result<reqwest::blocking::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().unwrap_or_default();
        Err(anyhow!("Sheets API {} failed with status {}: {}", action, status, body))
    }

    fn publish(&self, records: &[ApplicationRecord]) -> Result<String> {
        let response = self
            .client
            .post(SHEETS_API_URL)
            .bearer_auth(&self.access_token)
            .json(&json!({ "properties": { "title": self.title } }))
            .send()
            .context("Failed to reach Sheets API")?;
        let created: CreatedSpreadsheet = Self::check(response, "create")?
            .json()
            .context("Failed to parse Sheets API response")?;

        let response = self
            .client
            .put(format!("{}/{}/values/A1", SHEETS_API_URL, created.spreadsheet_id))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&self.access_token)
            .json(&json!({
                "range": "A1",
                "majorDimension": "ROWS",
                "values": table_rows(records),
            }))
            .send()
            .context("Failed to reach Sheets API")?;
        Self::check(response, "update")?;

        Ok(created.spreadsheet_url.unwrap_or_else(|| {
            format!("https://docs.google.com/spreadsheets/d/{}", created.spreadsheet_id)
        }))
    }
}

impl ExportTarget for SheetsExport {
    fn export(&self, records: &[ApplicationRecord]) -> String {
        match self.publish(records) {
            Ok(url) => {
                info!("exported {} rows to {}", records.len(), url);
                url
            }
            Err(e) => error_string("Sheets", e),
        }
    }
}
