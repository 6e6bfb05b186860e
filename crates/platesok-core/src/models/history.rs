//! Wire model for plate search history entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recorded lookup, as returned by the history endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryItem {
    pub id: i64,
    pub user_id: String,
    pub license_plate: String,
    pub timestamp: DateTime<Utc>,
}
