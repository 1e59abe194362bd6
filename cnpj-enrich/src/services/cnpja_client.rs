//! CNPJá API client
//!
//! Queries the public `office` endpoint (`GET <base_url>/<cnpj>`) and decodes
//! the company record. Failures come back as one of three distinct reasons
//! and are logged as such. The caller treats all of them as "no data".
//!
//! The client does not pace itself; spacing between calls belongs to the
//! pipeline's rate governor.

use crate::config::LookupSettings;
use crate::types::{CnpjLookup, LookupError, OfficePayload};
use reqwest::StatusCode;
use tracing::{debug, warn};

/// CNPJá HTTP client
pub struct CnpjaClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl CnpjaClient {
    pub fn new(settings: &LookupSettings) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .build()
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn office_url(&self, cnpj: &str) -> String {
        format!("{}/{}", self.base_url, cnpj)
    }
}

#[async_trait::async_trait]
impl CnpjLookup for CnpjaClient {
    fn name(&self) -> &'static str {
        "CNPJá"
    }

    async fn lookup(&self, cnpj: &str) -> Result<OfficePayload, LookupError> {
        let url = self.office_url(cnpj);
        debug!(cnpj = %cnpj, url = %url, "Querying CNPJá API");

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            warn!(cnpj = %cnpj, reason = "transport", error = %e, "Connection failure querying CNPJá");
            LookupError::Transport(e.to_string())
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(
                cnpj = %cnpj,
                reason = "not_found",
                status = status.as_u16(),
                "CNPJá returned non-success status"
            );
            return Err(LookupError::NotFound(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            warn!(cnpj = %cnpj, reason = "transport", error = %e, "Failed to read CNPJá response body");
            LookupError::Transport(e.to_string())
        })?;

        let payload: OfficePayload = serde_json::from_str(&body).map_err(|e| {
            warn!(cnpj = %cnpj, reason = "malformed", error = %e, "CNPJá response is not a JSON object");
            LookupError::Malformed(e.to_string())
        })?;

        debug!(
            cnpj = %cnpj,
            tax_id = payload.tax_id.as_deref().unwrap_or(""),
            "Retrieved company from CNPJá"
        );

        Ok(payload)
    }
}
