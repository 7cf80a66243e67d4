//! Backend gateway client for the burble widget.
//!
//! The gateway is the tenant's REST API for call lifecycle and widget
//! configuration. It is consumed, never served: this crate covers exactly
//! three operations, namely starting a call segment, ending a conversation,
//! and fetching the widget settings snapshot.

pub mod error;
pub mod http;
pub mod wire;

pub use error::GatewayError;
pub use http::HttpGateway;
pub use wire::{EndCallRequest, StartCallRequest, StartCallResponse};

use async_trait::async_trait;

use burble_core::types::WidgetTheme;

/// The backend gateway seam.
///
/// All gateway calls are fire-once: no automatic retry is scheduled, and
/// every error is recoverable from the caller's point of view.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// `POST /start-call`: begin a new call segment, optionally continuing
    /// a prior conversation.
    async fn start_call(&self, req: StartCallRequest) -> Result<StartCallResponse, GatewayError>;

    /// `POST /end-call-session`: end a conversation, correlating all of
    /// its call segments.
    async fn end_call_session(&self, req: EndCallRequest) -> Result<(), GatewayError>;

    /// `GET /widget-settings/{schema}/{agent}`: fetch the read-only widget
    /// configuration snapshot.
    async fn widget_settings(&self, schema: &str, agent: &str)
        -> Result<WidgetTheme, GatewayError>;
}
