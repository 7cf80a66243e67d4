use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque call identifier issued by the backend gateway when a call segment
/// starts. Persisted so a restarted widget can re-attach to the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation-level identifier (`call_session_id` on the wire). Issued by
/// every successful start-call response and held in memory for the mount;
/// the backend uses it to correlate all segments of one conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport address returned by the gateway, consumed exactly once by the
/// remote session to establish the real-time connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTarget(pub String);

impl JoinTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JoinTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Session status
// =============================================================================

/// Connection status of the call session.
///
/// Drives both the shell's status line and the reconciler's branching. The
/// three live states (`Connected`, `Listening`, `Speaking`) may interleave in
/// any order as the conversation goes back and forth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No call in progress. Ready to start.
    #[default]
    Disconnected,
    /// A start-call request or transport join is in flight.
    Connecting,
    /// Joined the remote session; neither side is actively talking.
    Connected,
    /// The agent is listening to the visitor.
    Listening,
    /// The agent is speaking.
    Speaking,
    /// Call teardown is in progress.
    Disconnecting,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Disconnected => write!(f, "disconnected"),
            SessionStatus::Connecting => write!(f, "connecting"),
            SessionStatus::Connected => write!(f, "connected"),
            SessionStatus::Listening => write!(f, "listening"),
            SessionStatus::Speaking => write!(f, "speaking"),
            SessionStatus::Disconnecting => write!(f, "disconnecting"),
        }
    }
}

impl SessionStatus {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, target),
            (Disconnected, Connecting)
                // A failed start rolls straight back; a close mid-start tears down.
                | (Connecting, Connected)
                | (Connecting, Disconnecting)
                | (Connecting, Disconnected)
                // The three live states interleave freely.
                | (Connected, Listening)
                | (Connected, Speaking)
                | (Listening, Connected)
                | (Listening, Speaking)
                | (Speaking, Connected)
                | (Speaking, Listening)
                // Any live state can begin teardown.
                | (Connected, Disconnecting)
                | (Listening, Disconnecting)
                | (Speaking, Disconnecting)
                | (Disconnecting, Disconnected)
        )
    }

    /// True once the remote session is established (connected, listening, or
    /// speaking).
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            SessionStatus::Connected | SessionStatus::Listening | SessionStatus::Speaking
        )
    }
}

// =============================================================================
// Call teardown
// =============================================================================

/// Why a call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The visitor closed the widget.
    UserClosed,
    /// The visitor toggled the mic off.
    UserToggledOff,
    /// The remote session began disconnecting on its own.
    Remote,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::UserClosed => write!(f, "user_closed"),
            EndReason::UserToggledOff => write!(f, "user_toggled_off"),
            EndReason::Remote => write!(f, "remote"),
        }
    }
}

// =============================================================================
// Forms and themes
// =============================================================================

/// Visitor-supplied intake form data, keyed by field key. Sent verbatim as
/// the `custom_form_fields` payload of a start-call request.
pub type FormFields = BTreeMap<String, String>;

/// Definition of one intake form field, as delivered by the widget-settings
/// endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFieldSpec {
    /// Stable key the submitted value is stored under.
    pub key: String,
    /// Human-readable label.
    pub label: String,
    /// Input type: "text", "tel", or "email".
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,
    /// Whether the field must be filled before submission.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Maximum value length in characters, if limited.
    #[serde(default, rename = "maxLength")]
    pub max_length: Option<usize>,
    /// Placeholder text, if any.
    #[serde(default)]
    pub placeholder: Option<String>,
}

fn default_field_type() -> String {
    "text".to_string()
}

fn default_true() -> bool {
    true
}

impl FormFieldSpec {
    /// True if this field only accepts telephone numbers.
    pub fn is_phone(&self) -> bool {
        self.field_type == "tel" || self.key == "phone"
    }
}

/// Behavioral widget configuration fetched once per mount.
///
/// Only fields that change behavior are retained; visual styling fields
/// (colors, logos, positioning) present in the same payload are ignored at
/// deserialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WidgetTheme {
    /// Display name of the agent, used in status lines.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    /// Start a call automatically on first mount.
    #[serde(rename = "bot_auto_start", default)]
    pub auto_start: bool,
    /// Show the live transcript box.
    #[serde(rename = "bot_show_transcript", default)]
    pub show_transcript: bool,
    /// Show the chat text input.
    #[serde(rename = "bot_show_chat", default)]
    pub show_chat: bool,
    /// Require the intake form before the first call.
    #[serde(rename = "bot_show_form", default)]
    pub show_form: bool,
    /// Mute the speaker while the hosting tab is hidden.
    #[serde(rename = "bot_mute_on_tab_change", default)]
    pub mute_on_tab_change: bool,
    /// Mute the speaker while the widget is minimized.
    #[serde(rename = "bot_mute_on_minimize", default)]
    pub mute_on_minimize: bool,
    /// Intake form field definitions.
    #[serde(default)]
    pub custom_form_fields: Vec<FormFieldSpec>,
}

fn default_bot_name() -> String {
    "AI Assistant".to_string()
}

impl Default for WidgetTheme {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            auto_start: false,
            show_transcript: true,
            show_chat: true,
            show_form: false,
            mute_on_tab_change: false,
            mute_on_minimize: false,
            custom_form_fields: Vec::new(),
        }
    }
}
