//! At-most-once applicant emails tied to application lifecycle events.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{ApplicationRecord, ForgivenessApplication};
use super::repository::{LedgerError, NotificationLedger, Notifier, NotifierError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DiscountReceived,
    DiscountEnrolled,
    AmnestyReceived,
    AmnestyEnrolled,
}

impl NotificationKind {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationKind::DiscountReceived => "discount_received",
            NotificationKind::DiscountEnrolled => "discount_enrolled",
            NotificationKind::AmnestyReceived => "amnesty_received",
            NotificationKind::AmnestyEnrolled => "amnesty_enrolled",
        }
    }

    pub const fn subject(self) -> &'static str {
        match self {
            NotificationKind::DiscountReceived => {
                "We received your application for the Buffalo Water Affordability Program"
            }
            NotificationKind::DiscountEnrolled => {
                "You have been successfully enrolled in the Buffalo Water Affordability Program"
            }
            NotificationKind::AmnestyReceived => {
                "We received your application for the Buffalo Water Amnesty Program"
            }
            NotificationKind::AmnestyEnrolled => {
                "You have been successfully enrolled in the Buffalo Water Amnesty Program"
            }
        }
    }

    const fn program_name(self) -> &'static str {
        match self {
            NotificationKind::DiscountReceived | NotificationKind::DiscountEnrolled => {
                "Buffalo Water Affordability Program"
            }
            NotificationKind::AmnestyReceived | NotificationKind::AmnestyEnrolled => {
                "Buffalo Water Amnesty Program"
            }
        }
    }
}

/// Per-address flags; each one flips to `true` at most once and never resets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationLedgerEntry {
    pub email_address: String,
    pub discount_received: bool,
    pub discount_enrolled: bool,
    pub amnesty_received: bool,
    pub amnesty_enrolled: bool,
}

impl NotificationLedgerEntry {
    pub fn new(email_address: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            ..Self::default()
        }
    }

    pub fn is_sent(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::DiscountReceived => self.discount_received,
            NotificationKind::DiscountEnrolled => self.discount_enrolled,
            NotificationKind::AmnestyReceived => self.amnesty_received,
            NotificationKind::AmnestyEnrolled => self.amnesty_enrolled,
        }
    }

    pub fn mark_sent(&mut self, kind: NotificationKind) {
        match kind {
            NotificationKind::DiscountReceived => self.discount_received = true,
            NotificationKind::DiscountEnrolled => self.discount_enrolled = true,
            NotificationKind::AmnestyReceived => self.amnesty_received = true,
            NotificationKind::AmnestyEnrolled => self.amnesty_enrolled = true,
        }
    }
}

/// Fully rendered message handed to the [`Notifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Template inputs for one applicant email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub kind: NotificationKind,
    pub first_name: String,
    pub email_address: String,
}

impl NotificationMessage {
    pub fn for_kind(
        kind: NotificationKind,
        first_name: impl Into<String>,
        email_address: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            first_name: first_name.into(),
            email_address: email_address.into(),
        }
    }

    pub fn render(&self, from_address: &str) -> OutboundEmail {
        let program = self.kind.program_name();
        let body = match self.kind {
            NotificationKind::DiscountReceived | NotificationKind::AmnestyReceived => format!(
                "<p>We received your application for the {program}. Our team will review it \
                 and contact you if we need anything else.</p>"
            ),
            NotificationKind::DiscountEnrolled | NotificationKind::AmnestyEnrolled => format!(
                "<p>You have been successfully enrolled in the {program}. The change will \
                 appear on an upcoming water bill.</p>"
            ),
        };

        OutboundEmail {
            from: from_address.to_string(),
            to: self.email_address.clone(),
            subject: self.kind.subject().to_string(),
            html_body: format!(
                "<p>Hi {},</p>{body}<p>Thank you,<br>Get Water Wise Buffalo</p>",
                escape_html(&self.first_name)
            ),
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    AlreadySent,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Notifier(#[from] NotifierError),
}

/// Consults the ledger, sends through the notifier, then records the send.
pub struct NotificationDispatcher {
    ledger: Arc<dyn NotificationLedger>,
    notifier: Arc<dyn Notifier>,
    from_address: String,
}

impl NotificationDispatcher {
    pub fn new(
        ledger: Arc<dyn NotificationLedger>,
        notifier: Arc<dyn Notifier>,
        from_address: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            notifier,
            from_address: from_address.into(),
        }
    }

    /// The ledger is only written after the notifier accepts the message, so a failed
    /// send is retried by the next triggering event.
    pub fn notify_once(
        &self,
        message: &NotificationMessage,
    ) -> Result<DispatchOutcome, DispatchError> {
        let already_sent = self
            .ledger
            .fetch(&message.email_address)?
            .map(|entry| entry.is_sent(message.kind))
            .unwrap_or(false);
        if already_sent {
            debug!(kind = message.kind.label(), "notification already sent");
            return Ok(DispatchOutcome::AlreadySent);
        }

        self.notifier.send(&message.render(&self.from_address))?;
        self.ledger
            .record_sent(&message.email_address, message.kind)?;
        info!(kind = message.kind.label(), "notification sent");
        Ok(DispatchOutcome::Sent)
    }
}

/// Where the send runs relative to the triggering request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    Inline,
    Background,
}

impl DispatchMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(Self::Inline),
            "background" => Some(Self::Background),
            _ => None,
        }
    }
}

/// Fire-and-forget lifecycle hooks used by the finalizer and status updates. Failures are
/// logged and never surface to the caller.
#[derive(Clone)]
pub struct NotificationTrigger {
    dispatcher: Arc<NotificationDispatcher>,
    mode: DispatchMode,
}

impl NotificationTrigger {
    pub fn new(dispatcher: Arc<NotificationDispatcher>, mode: DispatchMode) -> Self {
        Self { dispatcher, mode }
    }

    pub fn application_received(&self, record: &ApplicationRecord) {
        self.fire(
            NotificationKind::DiscountReceived,
            &record.first_name,
            record.email(),
        );
    }

    pub fn application_enrolled(&self, record: &ApplicationRecord) {
        self.fire(
            NotificationKind::DiscountEnrolled,
            &record.first_name,
            record.email(),
        );
    }

    pub fn amnesty_received(&self, record: &ForgivenessApplication) {
        self.fire(
            NotificationKind::AmnestyReceived,
            &record.first_name,
            record.email(),
        );
    }

    pub fn amnesty_enrolled(&self, record: &ForgivenessApplication) {
        self.fire(
            NotificationKind::AmnestyEnrolled,
            &record.first_name,
            record.email(),
        );
    }

    fn fire(&self, kind: NotificationKind, first_name: &str, email_address: Option<&str>) {
        let Some(email_address) = email_address else {
            debug!(kind = kind.label(), "no email address on record; skipping notification");
            return;
        };
        let message = NotificationMessage::for_kind(kind, first_name, email_address);

        if self.mode == DispatchMode::Background {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let dispatcher = Arc::clone(&self.dispatcher);
                handle.spawn_blocking(move || deliver(&dispatcher, &message));
                return;
            }
        }
        deliver(&self.dispatcher, &message);
    }
}

fn deliver(dispatcher: &NotificationDispatcher, message: &NotificationMessage) {
    if let Err(error) = dispatcher.notify_once(message) {
        warn!(kind = message.kind.label(), %error, "notification failed");
    }
}
