//! Wire shapes for the gateway's call lifecycle API.
//!
//! Field names match the backend exactly, including its mixed casing
//! (`callId`/`joinUrl` but `call_session_id`).

use serde::{Deserialize, Serialize};

use burble_core::types::{CallId, ConversationId, FormFields, JoinTarget, WidgetTheme};

/// Body of `POST /start-call`.
#[derive(Clone, Debug, Serialize)]
pub struct StartCallRequest {
    pub agent_code: String,
    pub schema_name: String,
    /// Continue-this-conversation hint: the call identifier persisted before
    /// a restart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_call_id: Option<CallId>,
    /// Visitor-supplied intake form data, if the theme required a form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_form_fields: Option<FormFields>,
}

impl StartCallRequest {
    /// A fresh call for the given identity.
    pub fn new(agent_code: impl Into<String>, schema_name: impl Into<String>) -> Self {
        Self {
            agent_code: agent_code.into(),
            schema_name: schema_name.into(),
            prior_call_id: None,
            custom_form_fields: None,
        }
    }

    /// Attach a prior call identifier to resume a conversation.
    pub fn resuming(mut self, prior_call_id: CallId) -> Self {
        self.prior_call_id = Some(prior_call_id);
        self
    }

    /// Attach intake form data.
    pub fn with_form(mut self, form: FormFields) -> Self {
        self.custom_form_fields = Some(form);
        self
    }
}

/// Body of a successful `POST /start-call` response.
#[derive(Clone, Debug, Deserialize)]
pub struct StartCallResponse {
    #[serde(rename = "callId")]
    pub call_id: CallId,
    #[serde(rename = "joinUrl")]
    pub join_url: JoinTarget,
    pub call_session_id: ConversationId,
}

/// Body of `POST /end-call-session`.
#[derive(Clone, Debug, Serialize)]
pub struct EndCallRequest {
    pub call_session_id: ConversationId,
    pub schema_name: String,
    /// Every call segment of the conversation, in order.
    pub prior_call_ids: Vec<CallId>,
}

/// Envelope the widget-settings endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
pub(crate) struct WidgetSettingsEnvelope {
    pub response: WidgetSettingsBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WidgetSettingsBody {
    pub widget_theme: WidgetTheme,
}
