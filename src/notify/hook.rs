//! Post-artifact hook and the WhatsApp notifier behind it.

use crate::config::NotifyConfig;
use crate::notify::{MessageTransport, NotificationError, OutboundMessage, ProfileStore};
use crate::store::StoredFile;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A new artifact was registered in the store.
#[derive(Debug, Clone)]
pub struct ArtifactEvent {
    pub file: StoredFile,
    /// Human-readable headline, e.g. "PDF merged".
    pub title: String,
}

/// Invoked after every successful artifact registration.
///
/// Implementations must not fail the caller; whatever goes wrong is theirs to log.
#[async_trait]
pub trait ArtifactHook: Send + Sync {
    async fn on_artifact(&self, event: &ArtifactEvent);
}

/// Why no message went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoProfile,
    Disabled,
    NoNumber,
    DailyLimit,
}

/// What the notifier did for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent {
        kind: &'static str,
        message_id: Option<String>,
        sent_today: u32,
    },
    Skipped(SkipReason),
}

/// Sends a WhatsApp message for each artifact, within the daily limit.
pub struct WhatsAppNotifier {
    profiles: Arc<ProfileStore>,
    transport: Arc<dyn MessageTransport>,
    config: NotifyConfig,
}

impl WhatsAppNotifier {
    pub fn new(
        profiles: Arc<ProfileStore>,
        transport: Arc<dyn MessageTransport>,
        config: NotifyConfig,
    ) -> Self {
        Self {
            profiles,
            transport,
            config,
        }
    }

    /// Calendar day at `now` in the configured counter timezone.
    pub fn today_at(&self, now: DateTime<Utc>) -> NaiveDate {
        match FixedOffset::east_opt(self.config.day_boundary_offset_minutes * 60) {
            Some(offset) => now.with_timezone(&offset).date_naive(),
            None => now.date_naive(),
        }
    }

    /// The message for `event`, given whether the session window is open.
    pub fn compose(&self, event: &ArtifactEvent, in_window: bool) -> OutboundMessage {
        if !in_window {
            return OutboundMessage::Template {
                name: self.config.template_name.clone(),
                language: self.config.template_language.clone(),
            };
        }
        let url = self.config.public_url(&event.file.public_token);
        if event.file.is_zip() {
            OutboundMessage::Text {
                body: format!("{}\n\nDownload ZIP here:\n{}", event.title, url),
            }
        } else {
            OutboundMessage::Document {
                link: url,
                filename: event.file.filename.clone(),
                caption: event.title.clone(),
            }
        }
    }

    pub async fn notify(&self, event: &ArtifactEvent) -> Result<Delivery, NotificationError> {
        self.notify_at(event, Utc::now()).await
    }

    /// Check the gate, send, and count the message only if the transport accepted it.
    pub async fn notify_at(
        &self,
        event: &ArtifactEvent,
        now: DateTime<Utc>,
    ) -> Result<Delivery, NotificationError> {
        let user = event.file.owner;
        let _guard = self.profiles.lock_user(user).await;
        let today = self.today_at(now);

        if !self
            .profiles
            .can_send(user, today, self.config.daily_limit)
            .await?
        {
            let reason = match self.profiles.get(user).await {
                None => SkipReason::NoProfile,
                Some(p) if !p.enabled => SkipReason::Disabled,
                Some(p) if p.whatsapp_number.is_empty() => SkipReason::NoNumber,
                Some(_) => SkipReason::DailyLimit,
            };
            debug!(user = %user, ?reason, "Notification skipped");
            return Ok(Delivery::Skipped(reason));
        }

        let Some(profile) = self.profiles.get(user).await else {
            return Ok(Delivery::Skipped(SkipReason::NoProfile));
        };
        let message = self.compose(event, profile.within_window(now, self.config.window_hours));
        let sent = self.transport.send(&profile.whatsapp_number, &message).await?;
        let sent_today = self.profiles.record_sent(user, today).await?;

        info!(
            user = %user,
            kind = message.kind(),
            sent_today,
            "WhatsApp notification sent for '{}'",
            event.file.filename
        );
        Ok(Delivery::Sent {
            kind: message.kind(),
            message_id: sent.message_id,
            sent_today,
        })
    }
}

#[async_trait]
impl ArtifactHook for WhatsAppNotifier {
    async fn on_artifact(&self, event: &ArtifactEvent) {
        if let Err(e) = self.notify(event).await {
            warn!(
                file = %event.file.id,
                transport = self.transport.name(),
                "WhatsApp notification failed: {}",
                e
            );
        }
    }
}
