use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::services::LockoutPolicy;
use crate::users::repo::UserStore;
use crate::users::repo_types::{is_legacy_credential, DatabaseReport, NewUser, RecentUser, User};

/// In-process `UserStore` backing the handler tests.
#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fully specified row, bypassing the registration flow.
    pub fn insert(&self, user: User) {
        self.rows.lock().unwrap().push(user);
    }

    pub fn get(&self, email: &str) -> Option<User> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn set_locked_until(&self, email: &str, until: Option<OffsetDateTime>) {
        if let Some(u) = self.rows.lock().unwrap().iter_mut().find(|u| u.email == email) {
            u.locked_until = until;
        }
    }

    pub fn set_active(&self, email: &str, active: bool) {
        if let Some(u) = self.rows.lock().unwrap().iter_mut().find(|u| u.email == email) {
            u.active = active;
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.get(email))
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn email_exists(&self, email: &str) -> anyhow::Result<bool> {
        Ok(self.get(email).is_some())
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<Option<User>> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.email == new.email) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            full_name: new.full_name,
            email: new.email,
            phone: new.phone,
            birth_date: new.birth_date,
            password_hash: new.password_hash,
            active: true,
            failed_logins: 0,
            locked_until: None,
            last_access_at: None,
            registered_at: OffsetDateTime::now_utc(),
            newsletter_opt_in: new.newsletter_opt_in,
        };
        rows.push(user.clone());
        Ok(Some(user))
    }

    async fn record_failed_login(
        &self,
        email: &str,
        policy: &LockoutPolicy,
    ) -> anyhow::Result<()> {
        if let Some(u) = self.rows.lock().unwrap().iter_mut().find(|u| u.email == email) {
            u.failed_logins += 1;
            if let Some(until) = policy.lock_after(u.failed_logins, OffsetDateTime::now_utc()) {
                u.locked_until = Some(until);
            }
        }
        Ok(())
    }

    async fn record_successful_login(&self, id: Uuid) -> anyhow::Result<()> {
        if let Some(u) = self.rows.lock().unwrap().iter_mut().find(|u| u.id == id) {
            u.failed_logins = 0;
            u.last_access_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }

    async fn upgrade_credential(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        if let Some(u) = self.rows.lock().unwrap().iter_mut().find(|u| u.id == id) {
            u.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn report(&self, recent: i64) -> anyhow::Result<DatabaseReport> {
        let rows = self.rows.lock().unwrap();
        let mut sorted: Vec<&User> = rows.iter().collect();
        sorted.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
        let recent_users = sorted
            .into_iter()
            .take(recent.max(0) as usize)
            .map(|u| RecentUser {
                id: u.id,
                full_name: u.full_name.clone(),
                email: u.email.clone(),
                registered_at: u.registered_at,
                active: u.active,
            })
            .collect();
        Ok(DatabaseReport {
            version: "in-memory".into(),
            users_exists: true,
            users_count: rows.len() as i64,
            recent_users,
        })
    }

    async fn delete_legacy_credentials(&self) -> anyhow::Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|u| !is_legacy_credential(&u.password_hash));
        Ok((before - rows.len()) as u64)
    }
}
