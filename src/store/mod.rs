//! Persistence against the hosted relational store
//!
//! Three tables are used: `users` (keyed by email), `qr_codes` (one row per
//! download) and `visits` (a counter keyed by user and application). The
//! helpers in this module implement the find-or-create / merge rules on top
//! of the [`Store`] trait; [`RestStore`] talks to a PostgREST endpoint and
//! [`MemoryStore`] keeps rows in process.

mod memory;
mod models;
mod rest;

pub use memory::{MemoryStore, StoreOp};
pub use models::{APP_ID, NewQrCode, NewUser, QrCodeRecord, User, UserChanges, UserInput, Visit};
pub use rest::RestStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Point lookups and writes against the three tables
#[async_trait]
pub trait Store: Send + Sync {
    /// Exact-match lookup by email
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Insert a user row and return it as stored
    async fn insert_user(&self, user: &NewUser) -> Result<User>;

    /// Overwrite the mutable columns of an existing user
    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<User>;

    /// Insert a QR configuration row
    async fn insert_qr_code(&self, qr: &NewQrCode) -> Result<QrCodeRecord>;

    /// Lookup of the visit counter for `(user_id, app_id)`
    async fn find_visit(&self, user_id: Uuid, app_id: &str) -> Result<Option<Visit>>;

    /// Insert or replace the visit counter for `(visit.user_id, visit.app_id)`
    async fn upsert_visit(&self, visit: &Visit) -> Result<Visit>;
}

/// Find-or-create a user by email.
///
/// New users get [`APP_ID`] seeded into their application list and a visit
/// recorded. Existing users that already carry [`APP_ID`] are returned as-is;
/// otherwise non-empty incoming fields are merged in and [`APP_ID`] appended.
pub async fn save_user(store: &dyn Store, input: &UserInput) -> Result<User> {
    let existing = store.find_user_by_email(&input.email).await?;

    let Some(existing) = existing else {
        let new_user = NewUser {
            email: input.email.clone(),
            name: input.name.clone(),
            organization: input.organization.clone(),
            ein: input.ein.clone(),
            app_ids: vec![APP_ID.to_string()],
        };
        let user = store.insert_user(&new_user).await?;
        info!(user_id = %user.id, "Created user");

        if update_visit(store, user.id, APP_ID).await.is_none() {
            warn!(user_id = %user.id, "Visit was not recorded for new user");
        }
        return Ok(user);
    };

    if existing.has_app(APP_ID) {
        debug!(user_id = %existing.id, "User already activated, leaving row unchanged");
        return Ok(existing);
    }

    let changes = merge_changes(&existing, input);
    let user = store.update_user(existing.id, &changes).await?;
    info!(user_id = %user.id, "Activated generator for existing user");
    Ok(user)
}

/// Merge non-blank incoming fields into `existing` and append [`APP_ID`].
fn merge_changes(existing: &User, input: &UserInput) -> UserChanges {
    let name = if input.name.trim().is_empty() {
        existing.name.clone()
    } else {
        input.name.clone()
    };
    let organization = input
        .organization
        .clone()
        .filter(|org| !org.trim().is_empty())
        .or_else(|| existing.organization.clone());
    let ein = input.ein.clone().or_else(|| existing.ein.clone());

    let mut app_ids = existing.app_ids.clone();
    if !existing.has_app(APP_ID) {
        app_ids.push(APP_ID.to_string());
    }

    UserChanges {
        name,
        organization,
        ein,
        app_ids,
    }
}

/// Insert one QR configuration row.
pub async fn save_qr_code(store: &dyn Store, qr: &NewQrCode) -> Result<QrCodeRecord> {
    let record = store.insert_qr_code(qr).await?;
    info!(qr_code_id = %record.id, user_id = %record.config.user_id, "Saved QR configuration");
    Ok(record)
}

/// Bump the visit counter for `(user_id, app_id)`.
///
/// Never fails: any store error is logged and `None` returned. The counter is
/// read and then written, so two concurrent visits can both write the same
/// count.
pub async fn update_visit(store: &dyn Store, user_id: Uuid, app_id: &str) -> Option<Visit> {
    let previous = match store.find_visit(user_id, app_id).await {
        Ok(previous) => previous,
        Err(err) => {
            warn!(%user_id, app_id, error = %err, "Failed to read visit counter");
            return None;
        }
    };

    let visit = Visit {
        user_id,
        app_id: app_id.to_string(),
        visit_count: previous.map_or(1, |v| v.visit_count + 1),
        last_visit: Utc::now(),
    };

    match store.upsert_visit(&visit).await {
        Ok(saved) => {
            debug!(%user_id, app_id, count = saved.visit_count, "Recorded visit");
            Some(saved)
        }
        Err(err) => {
            warn!(%user_id, app_id, error = %err, "Failed to record visit");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::profile::Ein;

    fn input(email: &str) -> UserInput {
        UserInput {
            name: "Harbor Food Bank".to_string(),
            email: email.to_string(),
            organization: Some("Harbor Food Bank Inc.".to_string()),
            ein: Some(Ein::parse("12-3456789").unwrap()),
        }
    }

    #[tokio::test]
    async fn creates_user_with_app_id_and_visit() {
        let store = MemoryStore::new();
        let user = save_user(&store, &input("ops@harbor.org")).await.unwrap();

        assert_eq!(user.app_ids, vec![APP_ID.to_string()]);
        assert_eq!(store.users().len(), 1);
        let visit = store.visit(user.id, APP_ID).unwrap();
        assert_eq!(visit.visit_count, 1);
    }

    #[tokio::test]
    async fn visit_failure_does_not_fail_user_creation() {
        let store = MemoryStore::new();
        store.fail_on(StoreOp::UpsertVisit);

        let user = save_user(&store, &input("ops@harbor.org")).await.unwrap();
        assert_eq!(user.email, "ops@harbor.org");
        assert!(store.visit(user.id, APP_ID).is_none());
    }

    #[tokio::test]
    async fn resubmission_returns_existing_row_unchanged() {
        let store = MemoryStore::new();
        let first = save_user(&store, &input("ops@harbor.org")).await.unwrap();

        let mut again = input("ops@harbor.org");
        again.name = "Someone Else".to_string();
        let second = save_user(&store, &again).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.users().len(), 1);
        assert_eq!(store.call_count(StoreOp::UpdateUser), 0);
    }

    #[tokio::test]
    async fn existing_user_from_other_app_is_merged() {
        let store = MemoryStore::new();
        let seeded = store.seed_user(NewUser {
            email: "ops@harbor.org".to_string(),
            name: "Harbor".to_string(),
            organization: Some("Harbor Org".to_string()),
            ein: None,
            app_ids: vec!["volunteer-portal".to_string()],
        });

        let blank_org = UserInput {
            name: "Harbor Food Bank".to_string(),
            email: "ops@harbor.org".to_string(),
            organization: None,
            ein: Some(Ein::parse("98-7654321").unwrap()),
        };
        let merged = save_user(&store, &blank_org).await.unwrap();

        assert_eq!(merged.id, seeded.id);
        assert_eq!(merged.name, "Harbor Food Bank");
        assert_eq!(merged.organization.as_deref(), Some("Harbor Org"));
        assert_eq!(merged.ein.as_ref().map(Ein::as_str), Some("98-7654321"));
        assert_eq!(
            merged.app_ids,
            vec!["volunteer-portal".to_string(), APP_ID.to_string()]
        );
        assert_eq!(store.users().len(), 1);
    }

    #[tokio::test]
    async fn lookup_failure_propagates() {
        let store = MemoryStore::new();
        store.fail_on(StoreOp::FindUser);
        let result = save_user(&store, &input("ops@harbor.org")).await;
        assert!(matches!(result, Err(Error::Store(_))));
        assert!(store.users().is_empty());
    }

    #[tokio::test]
    async fn update_visit_increments_and_swallows_errors() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();

        assert_eq!(update_visit(&store, user_id, APP_ID).await.unwrap().visit_count, 1);
        assert_eq!(update_visit(&store, user_id, APP_ID).await.unwrap().visit_count, 2);

        store.fail_on(StoreOp::FindVisit);
        assert!(update_visit(&store, user_id, APP_ID).await.is_none());
        assert_eq!(store.visit(user_id, APP_ID).unwrap().visit_count, 2);
    }

    #[tokio::test]
    async fn qr_code_errors_propagate() {
        let store = MemoryStore::new();
        store.fail_on(StoreOp::InsertQrCode);
        let qr = NewQrCode {
            user_id: Uuid::new_v4(),
            url: "https://harbor.org/give".to_string(),
            org_description: String::new(),
            url_purpose: String::new(),
            fg_color: "#000000".to_string(),
            bg_color: "#ffffff".to_string(),
            size: 256,
            has_logo: false,
        };
        assert!(save_qr_code(&store, &qr).await.is_err());
        assert!(store.qr_codes().is_empty());
    }
}
