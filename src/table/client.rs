//! Airtable REST API client.
//!
//! Lists follow the `offset` cursor until the view is exhausted. Writes are
//! sent in chunks of ten rows, the API's per-request limit. Nothing is retried.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Fields, Record, TableLocator, TableService, WriteMode};
use crate::config::AppConfig;
use crate::error::RemoteServiceError;

const SERVICE: &str = "Airtable";

/// Maximum rows per create/update request.
pub const MAX_RECORDS_PER_REQUEST: usize = 10;

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<Record>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    #[serde(default)]
    records: Vec<Record>,
}

#[derive(Debug, Serialize, PartialEq)]
struct NewRow<'a> {
    fields: &'a Fields,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct PerformUpsert<'a> {
    fields_to_merge_on: &'a [String],
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct WriteRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    perform_upsert: Option<PerformUpsert<'a>>,
    records: Vec<NewRow<'a>>,
}

/// Client for the Airtable REST API, authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct AirtableClient {
    api_url: String,
    token: String,
    http_client: Client,
}

impl AirtableClient {
    /// No client-side timeout is configured; calls wait as long as the service does.
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http_client: Client::builder()
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn with_http_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.airtable_api_url, &config.airtable_token)
    }

    fn table_url(&self, locator: &TableLocator) -> String {
        format!(
            "{}/{}/{}",
            self.api_url,
            urlencoding::encode(&locator.base_id),
            urlencoding::encode(&locator.table_id)
        )
    }

    fn list_url(&self, locator: &TableLocator, offset: Option<&str>) -> String {
        let mut params = Vec::new();
        if let Some(view) = &locator.view_id {
            params.push(format!("view={}", urlencoding::encode(view)));
        }
        if let Some(offset) = offset {
            params.push(format!("offset={}", urlencoding::encode(offset)));
        }
        let mut url = self.table_url(locator);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }

    async fn send_write(
        &self,
        method: Method,
        url: &str,
        body: &WriteRequest<'_>,
    ) -> Result<Vec<Record>, RemoteServiceError> {
        let response = self
            .http_client
            .request(method, url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteServiceError::request(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(RemoteServiceError::from_response(SERVICE, response).await);
        }

        let parsed: WriteResponse = response
            .json()
            .await
            .map_err(|e| RemoteServiceError::parse(SERVICE, e))?;
        Ok(parsed.records)
    }
}

/// HTTP method and body for one chunk of a write.
fn write_request<'a>(mode: &'a WriteMode, rows: &'a [Fields]) -> (Method, WriteRequest<'a>) {
    let records = rows.iter().map(|fields| NewRow { fields }).collect();
    match mode {
        WriteMode::Insert => (
            Method::POST,
            WriteRequest {
                perform_upsert: None,
                records,
            },
        ),
        WriteMode::Upsert {
            match_keys,
            replace,
        } => (
            if *replace { Method::PUT } else { Method::PATCH },
            WriteRequest {
                perform_upsert: Some(PerformUpsert {
                    fields_to_merge_on: match_keys,
                }),
                records,
            },
        ),
    }
}

#[async_trait]
impl TableService for AirtableClient {
    async fn fetch_rows(&self, locator: &TableLocator) -> Result<Vec<Record>, RemoteServiceError> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let url = self.list_url(locator, offset.as_deref());
            debug!(table = %locator, page_offset = ?offset, "Fetching Airtable page");

            let response = self
                .http_client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| RemoteServiceError::request(SERVICE, e))?;

            if !response.status().is_success() {
                return Err(RemoteServiceError::from_response(SERVICE, response).await);
            }

            let page: ListResponse = response
                .json()
                .await
                .map_err(|e| RemoteServiceError::parse(SERVICE, e))?;
            records.extend(page.records);

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        debug!(table = %locator, count = records.len(), "Fetched Airtable rows");
        Ok(records)
    }

    async fn write_rows(
        &self,
        locator: &TableLocator,
        rows: &[Fields],
        mode: &WriteMode,
    ) -> Result<Vec<Record>, RemoteServiceError> {
        let url = self.table_url(locator);
        let mut written = Vec::with_capacity(rows.len());

        for chunk in rows.chunks(MAX_RECORDS_PER_REQUEST) {
            let (method, body) = write_request(mode, chunk);
            debug!(table = %locator, %method, rows = chunk.len(), "Writing Airtable rows");
            written.extend(self.send_write(method, &url, &body).await?);
        }

        Ok(written)
    }
}
