//! Account model - the internal identity behind every provider link.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Internal account entity. Created once per distinct external user and
/// never duplicated; the email column carries a uniqueness constraint.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub account_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Account {
    pub fn new(email: String, display_name: Option<String>) -> Self {
        Self {
            account_id: Uuid::new_v4(),
            email,
            display_name,
            created_utc: Utc::now(),
        }
    }
}
