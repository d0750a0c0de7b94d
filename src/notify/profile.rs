//! Per-user notification profiles and the daily send gate.
//!
//! The counter and its date live on the profile. Every check or increment
//! first resets the counter when the stored date is not today, so a new day
//! always starts at zero no matter how long the user has been idle.
//!
//! [`ProfileStore`] performs each read-modify-write and the write to disk
//! under one lock, so concurrent conversions finishing together cannot lose
//! an increment.

use crate::notify::NotificationError;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// Notification settings and counters for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationProfile {
    pub user_id: Uuid,
    /// Destination number in international format, without `+` or `whatsapp:`.
    pub whatsapp_number: String,
    pub enabled: bool,
    /// Messages sent on `counter_date`.
    pub sent_today: u32,
    pub counter_date: NaiveDate,
    /// Last message the user sent us; opens the session window.
    pub last_inbound_at: Option<DateTime<Utc>>,
}

impl NotificationProfile {
    pub fn new(user_id: Uuid, whatsapp_number: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            user_id,
            whatsapp_number: normalize_number(&whatsapp_number.into()),
            enabled: true,
            sent_today: 0,
            counter_date: today,
            last_inbound_at: None,
        }
    }

    /// Zero the counter if it belongs to another day. Returns whether it changed.
    fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.counter_date == today {
            return false;
        }
        self.sent_today = 0;
        self.counter_date = today;
        true
    }

    /// Whether one more message may go out today.
    ///
    /// Resets a stale counter first, then requires the profile to be enabled,
    /// to have a number, and to be under `daily_limit`.
    pub fn can_send(&mut self, today: NaiveDate, daily_limit: u32) -> bool {
        self.roll_over(today);
        self.enabled && !self.whatsapp_number.is_empty() && self.sent_today < daily_limit
    }

    /// Count one delivered message.
    pub fn record_sent(&mut self, today: NaiveDate) {
        self.roll_over(today);
        self.sent_today = self.sent_today.saturating_add(1);
    }

    /// Whether free-form messages are allowed at `now`.
    pub fn within_window(&self, now: DateTime<Utc>, window_hours: u32) -> bool {
        self.last_inbound_at
            .is_some_and(|last| now - last <= Duration::hours(i64::from(window_hours)))
    }
}

/// Strip the `whatsapp:` scheme, a leading `+` and surrounding whitespace.
pub fn normalize_number(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed.strip_prefix("whatsapp:").unwrap_or(trimmed);
    without_scheme.trim().trim_start_matches('+').to_string()
}

/// Profiles keyed by user, optionally persisted as a JSON file.
pub struct ProfileStore {
    path: Option<PathBuf>,
    profiles: Mutex<HashMap<Uuid, NotificationProfile>>,
    user_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ProfileStore {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            profiles: Mutex::new(HashMap::new()),
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Load profiles from `path`, or start empty if it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, NotificationError> {
        let path = path.into();
        let profiles: Vec<NotificationProfile> = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                NotificationError::Store(format!("corrupt {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(NotificationError::Store(format!(
                    "reading {}: {e}",
                    path.display()
                )))
            }
        };
        info!("Loaded {} notification profiles", profiles.len());
        Ok(Self {
            path: Some(path),
            profiles: Mutex::new(profiles.into_iter().map(|p| (p.user_id, p)).collect()),
            user_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Serialise a user's check-send-record sequence.
    ///
    /// Holding the guard across the transport call keeps two notifications
    /// for the same user from both passing the limit check.
    pub async fn lock_user(&self, user_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.user_locks.lock().await;
            Arc::clone(locks.entry(user_id).or_default())
        };
        lock.lock_owned().await
    }

    pub async fn upsert(&self, profile: NotificationProfile) -> Result<(), NotificationError> {
        let mut profiles = self.profiles.lock().await;
        let previous = profiles.insert(profile.user_id, profile.clone());
        if let Err(e) = self.persist(&profiles).await {
            match previous {
                Some(old) => profiles.insert(old.user_id, old),
                None => profiles.remove(&profile.user_id),
            };
            return Err(e);
        }
        Ok(())
    }

    pub async fn get(&self, user_id: Uuid) -> Option<NotificationProfile> {
        self.profiles.lock().await.get(&user_id).cloned()
    }

    /// Reset-then-check for `user_id`; false when the user has no profile.
    ///
    /// A day roll-over is written back even when the answer is false.
    pub async fn can_send(
        &self,
        user_id: Uuid,
        today: NaiveDate,
        daily_limit: u32,
    ) -> Result<bool, NotificationError> {
        let mut profiles = self.profiles.lock().await;
        let Some(profile) = profiles.get_mut(&user_id) else {
            return Ok(false);
        };
        let rolled = profile.counter_date != today;
        let allowed = profile.can_send(today, daily_limit);
        if rolled {
            debug!(user = %user_id, "Daily counter reset");
            self.persist(&profiles).await?;
        }
        Ok(allowed)
    }

    /// Reset-then-increment for `user_id` and persist. Returns the new count.
    pub async fn record_sent(
        &self,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<u32, NotificationError> {
        let mut profiles = self.profiles.lock().await;
        let profile = profiles
            .get_mut(&user_id)
            .ok_or_else(|| NotificationError::Store(format!("no profile for {user_id}")))?;
        profile.record_sent(today);
        let count = profile.sent_today;
        self.persist(&profiles).await?;
        Ok(count)
    }

    /// Note an inbound message from `number`. Unknown numbers are ignored.
    ///
    /// Returns whether a profile matched.
    pub async fn record_inbound(
        &self,
        number: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, NotificationError> {
        let number = normalize_number(number);
        if number.is_empty() {
            return Ok(false);
        }
        let mut profiles = self.profiles.lock().await;
        let Some(profile) = profiles.values_mut().find(|p| p.whatsapp_number == number) else {
            debug!("Inbound message from unknown number ignored");
            return Ok(false);
        };
        profile.last_inbound_at = Some(at);
        self.persist(&profiles).await?;
        Ok(true)
    }

    async fn persist(
        &self,
        profiles: &HashMap<Uuid, NotificationProfile>,
    ) -> Result<(), NotificationError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut records: Vec<&NotificationProfile> = profiles.values().collect();
        records.sort_by_key(|p| p.user_id);
        let json = serde_json::to_vec_pretty(&records)
            .map_err(|e| NotificationError::Store(format!("serialising profiles: {e}")))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| NotificationError::Store(format!("creating {}: {e}", parent.display())))?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| NotificationError::Store(format!("writing {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| NotificationError::Store(format!("replacing {}: {e}", path.display())))?;
        Ok(())
    }
}
