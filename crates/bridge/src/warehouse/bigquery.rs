//! BigQuery backend: one load job per upload
//!
//! The parsed table is re-encoded as CSV and sent to the jobs endpoint as a
//! multipart upload together with the job configuration. The job uses
//! `WRITE_TRUNCATE`, so the table's rows and schema are replaced; the schema
//! is spelled out from the inferred Arrow types rather than left to
//! BigQuery's own detection. The job is then polled until it is `DONE`.

use super::{LoadSummary, Warehouse, deserialize_duration};
use crate::{CsvTable, IngestError, WarehouseError};
use arrow_schema::{DataType, Schema};
use async_trait::async_trait;
use diagnostics::{debug, info};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::{Duration, Instant};

const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

#[derive(Clone, Deserialize)]
pub struct BigQueryConfig {
    pub project: String,
    pub dataset: String,
    pub table: String,

    /// Dataset location, e.g. "US" (default: let BigQuery decide)
    #[serde(default)]
    pub location: Option<String>,

    /// API root (default: https://bigquery.googleapis.com)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// OAuth2 bearer token. When unset, GOOGLE_OAUTH_ACCESS_TOKEN is used,
    /// then the GCE metadata server.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Per-request timeout (default: 60s)
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,

    /// Delay between job status checks (default: 1s)
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub poll_interval: Duration,

    /// Give up waiting for the job after this long (default: 5m)
    #[serde(default = "default_max_wait", deserialize_with = "deserialize_duration")]
    pub max_wait: Duration,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}
fn default_timeout() -> Duration {
    Duration::from_secs(60)
}
fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}
fn default_max_wait() -> Duration {
    Duration::from_secs(300)
}

impl BigQueryConfig {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
            location: None,
            endpoint: default_endpoint(),
            access_token: None,
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            max_wait: default_max_wait(),
        }
    }
}

impl std::fmt::Debug for BigQueryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryConfig")
            .field("project", &self.project)
            .field("dataset", &self.dataset)
            .field("table", &self.table)
            .field("location", &self.location)
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    job_reference: JobReference,
    #[serde(default)]
    status: JobStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
}

#[derive(Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

pub struct BigQueryWarehouse {
    config: BigQueryConfig,
    http_client: reqwest::Client,
}

impl BigQueryWarehouse {
    pub fn new(config: BigQueryConfig) -> Result<Self, IngestError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| IngestError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    async fn access_token(&self) -> Result<String, WarehouseError> {
        if let Some(token) = &self.config.access_token {
            return Ok(token.clone());
        }
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            return Ok(token);
        }

        let response = self
            .http_client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| WarehouseError::Token(format!("metadata server unreachable: {e}")))?;
        let text = read_success(response, METADATA_TOKEN_URL).await?;
        let token: MetadataToken = serde_json::from_str(&text)?;
        Ok(token.access_token)
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/bigquery/v2/projects/{}/jobs?uploadType=multipart",
            self.config.endpoint.trim_end_matches('/'),
            self.config.project
        )
    }

    fn job_url(&self, job: &JobReference) -> String {
        let mut url = format!(
            "{}/bigquery/v2/projects/{}/jobs/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.project,
            job.job_id
        );
        if let Some(location) = job.location.as_ref().or(self.config.location.as_ref()) {
            url.push_str("?location=");
            url.push_str(location);
        }
        url
    }

    fn job_config(&self, job_id: &str, schema: &Schema) -> Value {
        let fields: Vec<Value> = schema
            .fields()
            .iter()
            .map(|f| json!({ "name": f.name(), "type": bigquery_type(f.data_type()), "mode": "NULLABLE" }))
            .collect();

        let mut job_reference = json!({ "projectId": self.config.project, "jobId": job_id });
        if let Some(location) = &self.config.location {
            job_reference["location"] = json!(location);
        }

        json!({
            "jobReference": job_reference,
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": self.config.project,
                        "datasetId": self.config.dataset,
                        "tableId": self.config.table,
                    },
                    "sourceFormat": "CSV",
                    "skipLeadingRows": 1,
                    "allowQuotedNewlines": true,
                    "writeDisposition": "WRITE_TRUNCATE",
                    "createDisposition": "CREATE_IF_NEEDED",
                    "schema": { "fields": fields },
                }
            }
        })
    }

    async fn wait_for(&self, token: &str, mut job: Job) -> Result<Job, WarehouseError> {
        let started = Instant::now();
        while job.status.state != "DONE" {
            if started.elapsed() >= self.config.max_wait {
                return Err(WarehouseError::Timeout {
                    job_id: job.job_reference.job_id,
                    waited: started.elapsed(),
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;

            let url = self.job_url(&job.job_reference);
            let response = self.http_client.get(&url).bearer_auth(token).send().await?;
            job = serde_json::from_str(&read_success(response, &url).await?)?;

            let job_id = job.job_reference.job_id.as_str();
            let state = job.status.state.as_str();
            debug!("Load job {job_id} is {state}", job_id, state);
        }
        Ok(job)
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    fn name(&self) -> &str {
        "BigQuery"
    }

    fn table(&self) -> String {
        format!(
            "{}.{}.{}",
            self.config.project, self.config.dataset, self.config.table
        )
    }

    async fn replace(&self, data: &CsvTable) -> Result<LoadSummary, WarehouseError> {
        let token = self.access_token().await?;
        let job_id = format!("sluice_{}", uuid7::uuid7()).replace('-', "_");
        let config = serde_json::to_vec(&self.job_config(&job_id, data.schema()))?;
        let payload = encode_csv(data)?;

        let boundary = format!("sluice-{}", uuid7::uuid7());
        let body = multipart_related(&boundary, &config, &payload);

        let url = self.upload_url();
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;
        let job: Job = serde_json::from_str(&read_success(response, &url).await?)?;

        let job = self.wait_for(&token, job).await?;
        if let Some(error) = job.status.error_result {
            return Err(WarehouseError::Job {
                job_id: job.job_reference.job_id,
                message: format!("{} ({})", error.message, error.reason),
            });
        }

        let table = self.table();
        let rows = data.num_rows();
        info!("Replaced BigQuery table {table} with {rows} rows", table, rows);
        Ok(LoadSummary { table, rows })
    }
}

async fn read_success(response: reqwest::Response, url: &str) -> Result<String, WarehouseError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(WarehouseError::Api {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        })
    }
}

/// BigQuery column type for an inferred Arrow type
fn bigquery_type(data_type: &DataType) -> &'static str {
    match data_type {
        DataType::Boolean => "BOOL",
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => "INT64",
        DataType::Float16 | DataType::Float32 | DataType::Float64 => "FLOAT64",
        DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => "NUMERIC",
        DataType::Date32 | DataType::Date64 => "DATE",
        DataType::Timestamp(_, None) => "DATETIME",
        DataType::Timestamp(_, Some(_)) => "TIMESTAMP",
        DataType::Time32(_) | DataType::Time64(_) => "TIME",
        _ => "STRING",
    }
}

fn encode_csv(data: &CsvTable) -> Result<Vec<u8>, WarehouseError> {
    let mut writer = arrow_csv::WriterBuilder::new()
        .with_header(true)
        .build(Vec::new());
    for batch in data.batches() {
        writer.write(batch)?;
    }
    Ok(writer.into_inner())
}

fn multipart_related(boundary: &str, config: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(config.len() + payload.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(config);
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
