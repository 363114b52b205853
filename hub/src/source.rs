use crate::connection::UserId;
use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The latest piece of updated state for one user. The hub never inspects the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub user_id: UserId,
    pub payload: Value,
    pub updated_at: DateTime<Utc>,
}

/// Supplies "what changed for this user since T".
///
/// Called once per registered connection on every dispatch tick, so returning
/// `Ok(None)` must be cheap. Errors are treated by the hub as "no update this
/// tick" and the same watermark is queried again on the next tick.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Return the single most recent update for `user_id` strictly newer than `since`.
    async fn get_update(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Option<Update>, Error>;
}

/// In-memory update store holding only the latest update per user.
#[derive(Default)]
pub struct MemoryUpdateSource {
    latest: DashMap<UserId, Update>,
}

impl MemoryUpdateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `payload` as the user's latest update, stamped with the current time.
    ///
    /// Timestamps for one user never go backwards, even if the wall clock does.
    pub fn publish(&self, user_id: UserId, payload: Value) -> Update {
        let mut entry = self.latest.entry(user_id.clone()).or_insert_with(|| Update {
            user_id,
            payload: Value::Null,
            updated_at: DateTime::<Utc>::MIN_UTC,
        });
        let updated_at = Utc::now().max(entry.updated_at);
        entry.payload = payload;
        entry.updated_at = updated_at;
        entry.clone()
    }

    /// Record an update with an explicit timestamp, replacing any previous one.
    pub fn publish_at(&self, user_id: UserId, payload: Value, updated_at: DateTime<Utc>) -> Update {
        let update = Update {
            user_id: user_id.clone(),
            payload,
            updated_at,
        };
        self.latest.insert(user_id, update.clone());
        update
    }

    pub fn latest(&self, user_id: &UserId) -> Option<Update> {
        self.latest.get(user_id).map(|entry| entry.clone())
    }
}

#[async_trait]
impl UpdateSource for MemoryUpdateSource {
    async fn get_update(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<Option<Update>, Error> {
        Ok(self
            .latest
            .get(user_id)
            .filter(|update| update.updated_at > since)
            .map(|update| update.clone()))
    }
}
