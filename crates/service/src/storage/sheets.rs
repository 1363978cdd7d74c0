use std::time::Duration;

use async_trait::async_trait;
use configs::SheetsConfig;
use models::{CellValue, ColumnLayout, Property, PropertyData};
use reqwest::{Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use super::google_auth::TokenSource;
use super::PropertyStore;
use crate::errors::StoreError;

/// Listings kept in one tab of a Google spreadsheet, through the Sheets v4
/// `values` API.
///
/// Row 1 holds the headers and is checked once per process before the
/// first read or write. Data lives in `A2:<last column>`; the last column
/// letter comes from the header count.
pub struct SheetsStore {
    http: reqwest::Client,
    api_base: Url,
    spreadsheet_id: String,
    sheet_name: String,
    layout: ColumnLayout,
    auth: TokenSource,
    headers_ready: OnceCell<()>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    major_dimension: Option<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetsStore {
    pub fn new(
        api_base: &str,
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
        layout: ColumnLayout,
        auth: TokenSource,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let api_base = Url::parse(api_base).map_err(|e| StoreError::Decode(format!("invalid api base `{api_base}`: {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(StoreError::Decode(format!("api base `{api_base}` cannot hold a path")));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base,
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            layout,
            auth,
            headers_ready: OnceCell::new(),
        })
    }

    pub fn from_config(cfg: &SheetsConfig) -> Result<Self, StoreError> {
        let creds = cfg
            .credentials()
            .ok_or_else(|| StoreError::Auth("no Google credentials configured".into()))?;
        Self::new(
            &cfg.api_base,
            &cfg.spreadsheet_id,
            &cfg.sheet_name,
            ColumnLayout::new(cfg.include_visitado),
            TokenSource::from_credentials(&creds)?,
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    /// Sheet name as it must appear in A1 notation; quoted unless plain.
    fn sheet_ref(&self) -> String {
        if self.sheet_name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            self.sheet_name.clone()
        } else {
            format!("'{}'", self.sheet_name.replace('\'', "''"))
        }
    }

    pub fn header_range(&self) -> String {
        format!("{}!A1:{}1", self.sheet_ref(), self.layout.last_column())
    }

    pub fn data_range(&self) -> String {
        self.rows_after(0)
    }

    /// Everything below the first `rows` data rows.
    pub fn rows_after(&self, rows: usize) -> String {
        format!("{}!A{}:{}", self.sheet_ref(), rows + 2, self.layout.last_column())
    }

    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, StoreError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Decode("api base cannot hold a path".into()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values"])
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    async fn check(resp: Response) -> Result<Response, StoreError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Api { status, body })
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<CellValue>>, StoreError> {
        let url = self.values_url(range, "")?;
        let token = self.auth.access_token(&self.http).await?;
        let resp = Self::check(self.http.get(url).bearer_auth(token).send().await?).await?;
        let body: ValueRange = resp.json().await.map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(json_to_cell).collect())
            .collect())
    }

    async fn update_values(&self, range: &str, values: Vec<Vec<Value>>) -> Result<(), StoreError> {
        let mut url = self.values_url(range, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = ValueRange {
            range: Some(range.to_string()),
            major_dimension: Some("ROWS".into()),
            values,
        };
        let token = self.auth.access_token(&self.http).await?;
        Self::check(self.http.put(url).bearer_auth(token).json(&body).send().await?).await?;
        Ok(())
    }

    async fn clear_values(&self, range: &str) -> Result<(), StoreError> {
        let url = self.values_url(range, ":clear")?;
        let token = self.auth.access_token(&self.http).await?;
        Self::check(self.http.post(url).bearer_auth(token).json(&serde_json::json!({})).send().await?).await?;
        Ok(())
    }

    async fn check_headers(&self) -> Result<(), StoreError> {
        let rows = self.get_values(&self.header_range()).await?;
        let first: Vec<String> = rows
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.into_raw_string())
            .collect();
        if self.layout.is_header_row(&first) {
            return Ok(());
        }
        info!(sheet = %self.sheet_name, found = ?first.first(), "header row missing or mismatched; rewriting");
        let headers = self.layout.headers().into_iter().map(Value::from).collect();
        self.update_values(&format!("{}!A1", self.sheet_ref()), vec![headers]).await
    }
}

fn json_to_cell(v: Value) -> CellValue {
    match v {
        Value::Null => CellValue::Empty,
        Value::String(s) => CellValue::Text(s),
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Empty),
        Value::Bool(b) => CellValue::Text(b.to_string()),
        other => CellValue::Text(other.to_string()),
    }
}

#[async_trait]
impl PropertyStore for SheetsStore {
    fn backend(&self) -> &'static str {
        "sheets"
    }

    async fn ensure_headers(&self) -> Result<(), StoreError> {
        // a failed check leaves the cell empty, so the next call retries
        self.headers_ready.get_or_try_init(|| self.check_headers()).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(sheet = %self.sheet_name))]
    async fn read_all(&self) -> Result<Vec<Property>, StoreError> {
        self.ensure_headers().await?;
        let rows = self.get_values(&self.data_range()).await?;
        let parsed: Vec<PropertyData> = rows
            .into_iter()
            .filter(|row| row.iter().any(|c| !c.is_blank()))
            .map(|row| PropertyData::from_positional(&row))
            .collect();
        debug!(rows = parsed.len(), "sheet read");
        Ok(Property::enumerate(parsed))
    }

    /// Overwrite from `A2` down, then clear whatever the old table had
    /// below the new last row. A failed overwrite leaves the old rows in place.
    #[instrument(skip(self, properties), fields(sheet = %self.sheet_name, rows = properties.len()))]
    async fn write_all(&self, properties: &[Property]) -> Result<(), StoreError> {
        self.ensure_headers().await?;
        if !properties.is_empty() {
            let values = properties
                .iter()
                .map(|p| {
                    p.data
                        .to_cells(self.layout)
                        .into_iter()
                        .map(|c| Value::String(c.into_raw_string()))
                        .collect()
                })
                .collect();
            self.update_values(&format!("{}!A2", self.sheet_ref()), values).await?;
        }
        self.clear_values(&self.rows_after(properties.len())).await?;
        debug!("sheet written");
        Ok(())
    }
}
