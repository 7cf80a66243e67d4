//! `reqwest`-backed gateway implementation.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use burble_core::types::WidgetTheme;

use crate::error::GatewayError;
use crate::wire::{EndCallRequest, StartCallRequest, StartCallResponse, WidgetSettingsEnvelope};
use crate::Gateway;

/// HTTP client for the backend gateway.
///
/// Timeouts are whatever the underlying client defaults to; none are
/// configured here. Requests are fire-once with no retry.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a gateway client for the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn start_call(&self, req: StartCallRequest) -> Result<StartCallResponse, GatewayError> {
        debug!(
            agent_code = %req.agent_code,
            schema_name = %req.schema_name,
            resuming = req.prior_call_id.is_some(),
            "POST /start-call"
        );
        let response = self
            .client
            .post(self.url("start-call"))
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                operation: "start-call",
                status: status.as_u16(),
            });
        }

        response
            .json::<StartCallResponse>()
            .await
            .map_err(|e| GatewayError::InvalidResponse {
                operation: "start-call",
                message: e.to_string(),
            })
    }

    async fn end_call_session(&self, req: EndCallRequest) -> Result<(), GatewayError> {
        debug!(
            call_session_id = %req.call_session_id,
            segments = req.prior_call_ids.len(),
            "POST /end-call-session"
        );
        let response = self
            .client
            .post(self.url("end-call-session"))
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                operation: "end-call-session",
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn widget_settings(
        &self,
        schema: &str,
        agent: &str,
    ) -> Result<WidgetTheme, GatewayError> {
        debug!(schema, agent, "GET /widget-settings");
        let response = self
            .client
            .get(self.url(&format!("widget-settings/{}/{}", schema, agent)))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                operation: "widget-settings",
                status: status.as_u16(),
            });
        }

        response
            .json::<WidgetSettingsEnvelope>()
            .await
            .map(|envelope| envelope.response.widget_theme)
            .map_err(|e| GatewayError::InvalidResponse {
                operation: "widget-settings",
                message: e.to_string(),
            })
    }
}
