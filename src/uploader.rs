use crate::reading::{AirQualityReading, EnviroReading};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

pub const ENVIRO_PATH: &str = "/enviro-data";
pub const AIR_QUALITY_PATH: &str = "/air-quality";

/// Destination for readings that are due. Implementations never fail; they report
/// whether the reading was accepted.
pub trait ReadingSink {
    fn send_enviro(&mut self, reading: &EnviroReading) -> bool;
    fn send_air_quality(&mut self, reading: &AirQualityReading) -> bool;
}

#[derive(Debug)]
pub enum UploadOutcome {
    Delivered,
    Rejected { status: StatusCode },
    Connect(reqwest::Error),
    Timeout(reqwest::Error),
    Request(reqwest::Error),
}

impl UploadOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Blocking JSON client for the readings API.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.unwrap_or_default().to_string(),
        })
    }

    pub fn post<T: Serialize>(&self, path: &str, payload: &T) -> UploadOutcome {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(payload)
            .send();
        match response {
            Ok(resp) if resp.status().is_success() => UploadOutcome::Delivered,
            Ok(resp) => UploadOutcome::Rejected {
                status: resp.status(),
            },
            Err(err) if err.is_connect() => UploadOutcome::Connect(err),
            Err(err) if err.is_timeout() => UploadOutcome::Timeout(err),
            Err(err) => UploadOutcome::Request(err),
        }
    }
}

/// Logs one warning per failed upload and folds the outcome into a bool.
fn report(api: &str, outcome: UploadOutcome) -> bool {
    match &outcome {
        UploadOutcome::Delivered => {}
        UploadOutcome::Rejected { status } => {
            // reqwest only exposes the status code, so the logged reason is the standard
            // phrase for that code rather than whatever text the server put on the status line.
            let reason = status.canonical_reason().unwrap_or("unknown status");
            tracing::warn!(api, status = status.as_u16(), reason, "API rejected reading");
        }
        UploadOutcome::Connect(err) => {
            tracing::warn!(api, error = %err, "API connection error");
        }
        UploadOutcome::Timeout(err) => {
            tracing::warn!(api, error = %err, "API timeout error");
        }
        UploadOutcome::Request(err) => {
            tracing::warn!(api, error = %err, "API request error");
        }
    }
    outcome.is_delivered()
}

impl ReadingSink for ApiClient {
    fn send_enviro(&mut self, reading: &EnviroReading) -> bool {
        report("enviro", self.post(ENVIRO_PATH, reading))
    }

    fn send_air_quality(&mut self, reading: &AirQualityReading) -> bool {
        report("air-quality", self.post(AIR_QUALITY_PATH, reading))
    }
}
