//! delivery of generated alerts to the alertmanager api
use std::{io::Write, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use http::{
    header::{HeaderName, HeaderValue, InvalidHeaderName, InvalidHeaderValue, CONTENT_TYPE},
    HeaderMap, StatusCode,
};
use indexmap::IndexMap;
use thiserror::Error;
use url::Url;

use crate::{alert, settings::Settings};

/// Error occuring while delivering alerts
#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid header name {name:?}")]
    InvalidHeaderName {
        name: String,
        source: InvalidHeaderName,
    },
    #[error("invalid value for header {name:?}")]
    InvalidHeaderValue {
        name: String,
        source: InvalidHeaderValue,
    },
    #[error("failed to encode alert payload")]
    Encode(#[from] serde_json::Error),
    #[error("http request failed")]
    Transport(#[from] reqwest::Error),
    /// the endpoint answered with anything but `200 OK`
    #[error("bad response code: {} ({})", .status.as_u16(), .body)]
    BadStatus { status: StatusCode, body: String },
}

/// Posts alert payloads to a single endpoint. Every request carries
/// `Content-Type: application/json` and the configured extra headers, a
/// configured header with the same name replaces the content type.
#[derive(Debug, Clone)]
pub struct AlertSender {
    client: reqwest::Client,
    url: Url,
    headers: HeaderMap,
}

impl AlertSender {
    pub fn new(
        url: Url,
        headers: &IndexMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, SendError> {
        let mut header_map = HeaderMap::new();
        header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (name, value) in headers.iter() {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|source| {
                SendError::InvalidHeaderName {
                    name: name.clone(),
                    source,
                }
            })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|source| SendError::InvalidHeaderValue {
                    name: name.clone(),
                    source,
                })?;

            header_map.insert(header_name, header_value);
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url,
            headers: header_map,
        })
    }

    /// Sends `payload` once, without retries. Only `200 OK` counts as
    /// success, otherwise the response body ends up in the error.
    pub async fn send(&self, payload: String) -> Result<(), SendError> {
        let response = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::BadStatus { status, body });
        }

        tracing::info!(url = %self.url, status = status.as_u16(), "alerts delivered");

        Ok(())
    }
}

/// Generates the alerts described by `settings`, writes the json payload to
/// `out` and posts it to `settings.url`.
pub async fn send_alerts(settings: &Settings, out: &mut impl Write) -> Result<()> {
    let alerts = alert::generate(settings, Utc::now());
    tracing::info!(count = alerts.len(), status = %settings.status, "generated alerts");

    let payload = serde_json::to_string(&alerts).map_err(SendError::from)?;

    writeln!(out, "{}", payload).context("failed to print alert payload")?;
    out.flush().context("failed to print alert payload")?;

    let sender = AlertSender::new(settings.url.clone(), &settings.headers, settings.timeout)?;
    sender.send(payload).await?;

    Ok(())
}
