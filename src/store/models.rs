//! Rows exchanged with the remote store

use crate::profile::Ein;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Application identifier recorded on users and visits
pub const APP_ID: &str = "qr-code-generator";

/// A row of the `users` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Store-assigned identity
    pub id: Uuid,
    /// Unique lookup key
    pub email: String,
    /// Display name
    pub name: String,
    /// Organization name
    #[serde(default)]
    pub organization: Option<String>,
    /// Employer Identification Number
    #[serde(default)]
    pub ein: Option<Ein>,
    /// Applications this user has activated
    #[serde(default)]
    pub app_ids: Vec<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether `app_id` is already in the user's activated list
    pub fn has_app(&self, app_id: &str) -> bool {
        self.app_ids.iter().any(|id| id == app_id)
    }
}

/// Validated payload produced by the profile form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInput {
    /// Display name
    pub name: String,
    /// Email, used to find an existing row
    pub email: String,
    /// Organization name, `None` when left blank
    pub organization: Option<String>,
    /// EIN, `None` when left blank
    pub ein: Option<Ein>,
}

/// Insert payload for `users`
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    /// Email
    pub email: String,
    /// Display name
    pub name: String,
    /// Organization name
    pub organization: Option<String>,
    /// EIN
    pub ein: Option<Ein>,
    /// Initial activated application list
    pub app_ids: Vec<String>,
}

/// Patch payload for an existing `users` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserChanges {
    /// Display name
    pub name: String,
    /// Organization name
    pub organization: Option<String>,
    /// EIN
    pub ein: Option<Ein>,
    /// Activated application list
    pub app_ids: Vec<String>,
}

/// Insert payload for `qr_codes`: a snapshot of the generator at download time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQrCode {
    /// Owning user
    pub user_id: Uuid,
    /// Encoded target URL
    pub url: String,
    /// Organization description text
    pub org_description: String,
    /// URL purpose text
    pub url_purpose: String,
    /// Foreground color, `#RRGGBB`
    pub fg_color: String,
    /// Background color, `#RRGGBB`
    pub bg_color: String,
    /// Preview size in pixels
    pub size: u32,
    /// Whether a logo was embedded
    pub has_logo: bool,
}

/// A row of the `qr_codes` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrCodeRecord {
    /// Store-assigned identity
    pub id: Uuid,
    /// Configuration columns
    #[serde(flatten)]
    pub config: NewQrCode,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A row of the `visits` table, keyed by `(user_id, app_id)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    /// Visiting user
    pub user_id: Uuid,
    /// Application visited
    pub app_id: String,
    /// Number of recorded visits
    pub visit_count: i64,
    /// Timestamp of the latest visit
    pub last_visit: DateTime<Utc>,
}
