use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Link between a local shadow user and an application's legacy user id.
///
/// Created lazily the first time a legacy-authenticated user logs in; unique
/// on (`application_id`, `legacy_user_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationUserMapping {
    pub id: Uuid,
    pub application_id: Uuid,
    pub user_id: Uuid,
    pub legacy_user_id: String,
    pub created_at: DateTime<Utc>,
}

impl ApplicationUserMapping {
    pub fn new(application_id: Uuid, user_id: Uuid, legacy_user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            application_id,
            user_id,
            legacy_user_id: legacy_user_id.into(),
            created_at: Utc::now(),
        }
    }
}
