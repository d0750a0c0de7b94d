//! WhatsApp delivery of finished artifacts.
//!
//! ```text
//!  artifact registered ──► ArtifactHook::on_artifact
//!                              │
//!                              ▼
//!                      WhatsAppNotifier ── per-user lock ──┐
//!                              │                           │
//!          ProfileStore::can_send (reset day, check limit) │
//!                              │                           │
//!          inside 24h window? ── text / document : template│
//!                              │                           │
//!                 MessageTransport::send                   │
//!                              │ ok                        │
//!          ProfileStore::record_sent ◄─────────────────────┘
//! ```
//!
//! Failures stop at [`ArtifactHook::on_artifact`]: they are logged and the
//! conversion that produced the artifact is unaffected.

pub mod hook;
pub mod profile;
pub mod whatsapp;

pub use hook::{ArtifactEvent, ArtifactHook, Delivery, SkipReason, WhatsAppNotifier};
pub use profile::{NotificationProfile, ProfileStore};
pub use whatsapp::{MessageTransport, OutboundMessage, SentMessage, WhatsAppCloud, WhatsAppConfig};

use thiserror::Error;

/// Errors from the notification path. Never returned by a conversion.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// An HTTP-level transport error occurred.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The WhatsApp API returned an error response.
    #[error("WhatsApp API error: {0}")]
    Api(String),

    /// The API answered 429.
    #[error("rate limited by WhatsApp")]
    RateLimited,

    /// Credentials or transport are missing.
    #[error("WhatsApp is not configured: {0}")]
    NotConfigured(String),

    /// The profile store could not be read or written.
    #[error("profile store error: {0}")]
    Store(String),
}
