//! In-process store used for offline runs and tests

use super::{NewQrCode, NewUser, QrCodeRecord, Store, User, UserChanges, Visit};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

/// Store operations, used to inject failures and count calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `find_user_by_email`
    FindUser,
    /// `insert_user`
    InsertUser,
    /// `update_user`
    UpdateUser,
    /// `insert_qr_code`
    InsertQrCode,
    /// `find_visit`
    FindVisit,
    /// `upsert_visit`
    UpsertVisit,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    qr_codes: Vec<QrCodeRecord>,
    visits: HashMap<(Uuid, String), Visit>,
    failing: HashSet<StoreOp>,
    calls: HashMap<StoreOp, usize>,
}

impl MemoryState {
    fn enter(&mut self, op: StoreOp) -> Result<()> {
        *self.calls.entry(op).or_default() += 1;
        if self.failing.contains(&op) {
            return Err(Error::Store(format!("{op:?} unavailable")));
        }
        Ok(())
    }
}

/// Store that keeps every table in memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `op` fail with [`Error::Store`].
    pub fn fail_on(&self, op: StoreOp) {
        self.lock().failing.insert(op);
    }

    /// Insert a user directly, bypassing the find-or-create rules.
    pub fn seed_user(&self, user: NewUser) -> User {
        let row = user_row(user);
        self.lock().users.push(row.clone());
        row
    }

    /// Snapshot of the `users` table
    pub fn users(&self) -> Vec<User> {
        self.lock().users.clone()
    }

    /// Snapshot of the `qr_codes` table
    pub fn qr_codes(&self) -> Vec<QrCodeRecord> {
        self.lock().qr_codes.clone()
    }

    /// Current visit row for `(user_id, app_id)`
    pub fn visit(&self, user_id: Uuid, app_id: &str) -> Option<Visit> {
        self.lock()
            .visits
            .get(&(user_id, app_id.to_string()))
            .cloned()
    }

    /// How many times `op` was attempted, including failed attempts
    pub fn call_count(&self, op: StoreOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test assertion panicked mid-call.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn user_row(user: NewUser) -> User {
    User {
        id: Uuid::new_v4(),
        email: user.email,
        name: user.name,
        organization: user.organization,
        ein: user.ein,
        app_ids: user.app_ids,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut state = self.lock();
        state.enter(StoreOp::FindUser)?;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: &NewUser) -> Result<User> {
        let mut state = self.lock();
        state.enter(StoreOp::InsertUser)?;
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(Error::Store(format!(
                "duplicate key value violates unique constraint on email '{}'",
                user.email
            )));
        }
        let row = user_row(user.clone());
        state.users.push(row.clone());
        Ok(row)
    }

    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<User> {
        let mut state = self.lock();
        state.enter(StoreOp::UpdateUser)?;
        let row = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| Error::Store(format!("user {id} not found")))?;
        row.name = changes.name.clone();
        row.organization = changes.organization.clone();
        row.ein = changes.ein.clone();
        row.app_ids = changes.app_ids.clone();
        Ok(row.clone())
    }

    async fn insert_qr_code(&self, qr: &NewQrCode) -> Result<QrCodeRecord> {
        let mut state = self.lock();
        state.enter(StoreOp::InsertQrCode)?;
        let record = QrCodeRecord {
            id: Uuid::new_v4(),
            config: qr.clone(),
            created_at: Utc::now(),
        };
        state.qr_codes.push(record.clone());
        Ok(record)
    }

    async fn find_visit(&self, user_id: Uuid, app_id: &str) -> Result<Option<Visit>> {
        let mut state = self.lock();
        state.enter(StoreOp::FindVisit)?;
        Ok(state.visits.get(&(user_id, app_id.to_string())).cloned())
    }

    async fn upsert_visit(&self, visit: &Visit) -> Result<Visit> {
        let mut state = self.lock();
        state.enter(StoreOp::UpsertVisit)?;
        state
            .visits
            .insert((visit.user_id, visit.app_id.clone()), visit.clone());
        Ok(visit.clone())
    }
}
