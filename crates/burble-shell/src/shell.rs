//! Theme-driven widget shell.

use std::sync::Arc;

use tracing::debug;

use burble_core::events::WidgetEvent;
use burble_core::types::{EndReason, FormFields, SessionStatus, WidgetTheme};
use burble_reconciler::{Reconciler, ReconcilerError};

use crate::error::ShellError;

/// Presentation state of one mounted widget.
///
/// The shell never talks to the gateway or the transport directly; every
/// call action goes through the reconciler, and lifecycle events come back
/// through [`WidgetShell::apply_event`].
pub struct WidgetShell {
    theme: WidgetTheme,
    reconciler: Arc<Reconciler>,
    expanded: bool,
    transcript: Option<String>,
    form_visible: bool,
    inline_error: Option<String>,
}

impl WidgetShell {
    pub fn new(theme: WidgetTheme, reconciler: Arc<Reconciler>) -> Self {
        let form_visible = theme.show_form;
        Self {
            theme,
            reconciler,
            expanded: false,
            transcript: None,
            form_visible,
            inline_error: None,
        }
    }

    pub fn theme(&self) -> &WidgetTheme {
        &self.theme
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    pub fn form_visible(&self) -> bool {
        self.form_visible
    }

    pub fn inline_error(&self) -> Option<&str> {
        self.inline_error.as_deref()
    }

    /// The status line shown in the widget header.
    pub fn status_line(&self) -> String {
        let name = &self.theme.bot_name;
        match self.reconciler.status() {
            SessionStatus::Disconnected => format!("Talk To {name}"),
            SessionStatus::Connecting => format!("Connecting To {name}"),
            SessionStatus::Connected => format!("Connected To {name}"),
            SessionStatus::Listening => format!("{name} is Listening"),
            SessionStatus::Speaking => format!("{name} is Speaking"),
            SessionStatus::Disconnecting => "Disconnecting...".to_string(),
        }
    }

    /// Mount the widget: clear the refresh flag, resume a pending call if
    /// one survived the restart, and otherwise auto-start when the theme
    /// asks for it and no intake form stands in the way.
    pub async fn mount(&mut self) -> Result<(), ShellError> {
        self.reconciler.finish_load()?;

        if self.reconciler.reconnect_if_pending().await? {
            debug!("Mounted into a resumed call");
            self.expanded = true;
            self.form_visible = false;
            return Ok(());
        }

        if self.theme.auto_start && !self.theme.show_form {
            self.start(None).await?;
        }
        Ok(())
    }

    /// Mic button: start a call when idle, end it when not.
    pub async fn toggle_mic(&mut self) -> Result<(), ShellError> {
        if self.reconciler.status() == SessionStatus::Disconnected {
            if self.form_visible {
                return Err(ShellError::FormRequired);
            }
            self.start(None).await
        } else {
            self.reconciler.end_call(EndReason::UserToggledOff).await?;
            Ok(())
        }
    }

    /// Close button: end any active call and collapse the widget.
    pub async fn close(&mut self) -> Result<(), ShellError> {
        if self.reconciler.status() != SessionStatus::Disconnected {
            self.reconciler.end_call(EndReason::UserClosed).await?;
        }
        self.expanded = false;
        self.transcript = None;
        Ok(())
    }

    /// Collapse the widget to its launcher bubble.
    pub async fn minimize(&mut self) {
        self.expanded = false;
        if self.theme.mute_on_minimize && self.reconciler.status().is_live() {
            self.reconciler.mute_speaker().await;
        }
    }

    /// Expand the widget from its launcher bubble.
    pub async fn expand(&mut self) {
        self.expanded = true;
        if self.theme.mute_on_minimize && self.reconciler.is_speaker_muted() {
            self.reconciler.unmute_speaker().await;
        }
    }

    /// The hosting tab went to the background.
    pub async fn tab_hidden(&self) {
        if self.theme.mute_on_tab_change && self.reconciler.status().is_live() {
            self.reconciler.mute_speaker().await;
        }
    }

    /// The hosting tab came back to the foreground.
    pub async fn tab_visible(&self) {
        if self.theme.mute_on_tab_change && self.reconciler.is_speaker_muted() {
            self.reconciler.unmute_speaker().await;
        }
    }

    /// Validate and submit the intake form, then start the call with its
    /// values attached.
    pub async fn submit_form(&mut self, values: FormFields) -> Result<(), ShellError> {
        let form = self.validate_form(&values)?;
        self.start(Some(form)).await
    }

    /// Send a chat message over the live call. Blank input is ignored.
    pub async fn send_message(&mut self, text: &str) -> Result<(), ShellError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        self.reconciler.send_text(text).await?;
        Ok(())
    }

    /// Fold a widget event into presentation state.
    pub fn apply_event(&mut self, event: &WidgetEvent) {
        match event {
            WidgetEvent::TranscriptUpdated { text, .. } => {
                if self.theme.show_transcript {
                    self.transcript = Some(text.clone());
                }
            }
            WidgetEvent::StatusChanged {
                to: SessionStatus::Speaking,
                ..
            } => {
                // The agent talking is the one moment worth interrupting a
                // minimized widget for.
                self.expanded = true;
            }
            WidgetEvent::CallEnded { .. } => {
                self.transcript = None;
                self.form_visible = self.theme.show_form;
            }
            WidgetEvent::GatewayFailed { message, .. } => {
                self.inline_error = Some(message.clone());
            }
            _ => {}
        }
    }

    async fn start(&mut self, form: Option<FormFields>) -> Result<(), ShellError> {
        match self.reconciler.start_new_call(form).await {
            Ok(_) => {
                self.inline_error = None;
                self.form_visible = false;
                self.expanded = true;
                Ok(())
            }
            Err(e @ ReconcilerError::Gateway(_)) => {
                // The start failed terminally; surface the error inline and
                // put the form back so the visitor can retry.
                self.inline_error = Some(e.to_string());
                self.form_visible = self.theme.show_form;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn validate_form(&self, values: &FormFields) -> Result<FormFields, ShellError> {
        let mut out = FormFields::new();
        for spec in &self.theme.custom_form_fields {
            let value = values
                .get(&spec.key)
                .map(|v| v.trim().to_string())
                .unwrap_or_default();

            if value.is_empty() {
                if spec.required {
                    return Err(ShellError::Validation {
                        field: spec.key.clone(),
                        message: format!("{} is required", spec.label),
                    });
                }
                continue;
            }
            if spec.is_phone() && !value.chars().all(|c| c.is_ascii_digit()) {
                return Err(ShellError::Validation {
                    field: spec.key.clone(),
                    message: format!("{} must contain digits only", spec.label),
                });
            }
            if let Some(max) = spec.max_length {
                if value.chars().count() > max {
                    return Err(ShellError::Validation {
                        field: spec.key.clone(),
                        message: format!("{} must be at most {max} characters", spec.label),
                    });
                }
            }
            out.insert(spec.key.clone(), value);
        }
        Ok(out)
    }
}

// =============================================================================
// Tests
// =============================================================================
