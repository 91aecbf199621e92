// Test doubles for the moderation ports.

use super::moderation_ports::{
    ChatTransport, ModerationError, ModerationStore, RoleResolver, TransportError,
};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory store with a switch to simulate the database going away.
pub struct MockStore {
    settings: DashMap<(i64, String), String>,
    approved: DashSet<(i64, u64)>,
    warnings: DashMap<(i64, u64), u32>,
    unavailable: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            settings: DashMap::new(),
            approved: DashSet::new(),
            warnings: DashMap::new(),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), ModerationError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(ModerationError::StorageError("database unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ModerationStore for MockStore {
    async fn get_setting(&self, chat_id: i64, key: &str) -> Result<Option<String>, ModerationError> {
        self.check()?;
        Ok(self
            .settings
            .get(&(chat_id, key.to_string()))
            .map(|v| v.clone()))
    }

    async fn set_setting(
        &self,
        chat_id: i64,
        key: &str,
        value: &str,
    ) -> Result<(), ModerationError> {
        self.check()?;
        self.settings
            .insert((chat_id, key.to_string()), value.to_string());
        Ok(())
    }

    async fn is_approved(&self, chat_id: i64, user_id: u64) -> Result<bool, ModerationError> {
        self.check()?;
        Ok(self.approved.contains(&(chat_id, user_id)))
    }

    async fn approve_user(&self, chat_id: i64, user_id: u64) -> Result<(), ModerationError> {
        self.check()?;
        self.approved.insert((chat_id, user_id));
        Ok(())
    }

    async fn unapprove_user(&self, chat_id: i64, user_id: u64) -> Result<bool, ModerationError> {
        self.check()?;
        Ok(self.approved.remove(&(chat_id, user_id)).is_some())
    }

    async fn approved_users(&self, chat_id: i64) -> Result<Vec<u64>, ModerationError> {
        self.check()?;
        let mut users: Vec<u64> = self
            .approved
            .iter()
            .map(|entry| *entry.key())
            .filter(|(chat, _)| *chat == chat_id)
            .map(|(_, user)| user)
            .collect();
        users.sort_unstable();
        Ok(users)
    }

    async fn increment_warning(&self, chat_id: i64, user_id: u64) -> Result<u32, ModerationError> {
        self.check()?;
        let mut count = self.warnings.entry((chat_id, user_id)).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn reset_warning(&self, chat_id: i64, user_id: u64) -> Result<(), ModerationError> {
        self.check()?;
        self.warnings.remove(&(chat_id, user_id));
        Ok(())
    }

    async fn get_warnings(&self, chat_id: i64, user_id: u64) -> Result<u32, ModerationError> {
        self.check()?;
        Ok(self
            .warnings
            .get(&(chat_id, user_id))
            .map(|v| *v)
            .unwrap_or(0))
    }
}

/// Transport that records every action and can be told to fail.
pub struct MockTransport {
    bios: DashMap<u64, String>,
    admins: DashSet<(i64, u64)>,
    bio_fetches: AtomicUsize,
    bio_delay_ms: AtomicU64,
    fail_bio: AtomicBool,
    fail_delete: AtomicBool,
    fail_restrict: AtomicBool,
    fail_reply: AtomicBool,
    deleted: Mutex<Vec<(i64, i32)>>,
    restricted: Mutex<Vec<(i64, u64, bool)>>,
    replies: Mutex<Vec<(i64, i32, String)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            bios: DashMap::new(),
            admins: DashSet::new(),
            bio_fetches: AtomicUsize::new(0),
            bio_delay_ms: AtomicU64::new(0),
            fail_bio: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_restrict: AtomicBool::new(false),
            fail_reply: AtomicBool::new(false),
            deleted: Mutex::new(Vec::new()),
            restricted: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
        }
    }

    pub fn set_bio(&self, user_id: u64, bio: &str) {
        self.bios.insert(user_id, bio.to_string());
    }

    pub fn set_bio_delay(&self, delay: Duration) {
        self.bio_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn add_admin(&self, chat_id: i64, user_id: u64) {
        self.admins.insert((chat_id, user_id));
    }

    pub fn fail_bio_fetch(&self, fail: bool) {
        self.fail_bio.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub fn fail_restrict(&self, fail: bool) {
        self.fail_restrict.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reply(&self, fail: bool) {
        self.fail_reply.store(fail, Ordering::SeqCst);
    }

    pub fn bio_fetches(&self) -> usize {
        self.bio_fetches.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<(i64, i32)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn restricted(&self) -> Vec<(i64, u64, bool)> {
        self.restricted.lock().unwrap().clone()
    }

    pub fn replies(&self) -> Vec<(i64, i32, String)> {
        self.replies.lock().unwrap().clone()
    }

    fn outcome(flag: &AtomicBool, what: &str) -> Result<(), TransportError> {
        if flag.load(Ordering::SeqCst) {
            Err(TransportError::Request(format!("{} failed", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), TransportError> {
        Self::outcome(&self.fail_delete, "delete")?;
        self.deleted.lock().unwrap().push((chat_id, message_id));
        Ok(())
    }

    async fn restrict_send(
        &self,
        chat_id: i64,
        user_id: u64,
        allowed: bool,
    ) -> Result<(), TransportError> {
        // Record the attempt even when it fails, so tests can count mute requests.
        self.restricted
            .lock()
            .unwrap()
            .push((chat_id, user_id, allowed));
        Self::outcome(&self.fail_restrict, "restrict")
    }

    async fn fetch_profile_bio(&self, user_id: u64) -> Result<Option<String>, TransportError> {
        self.bio_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = self.bio_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Self::outcome(&self.fail_bio, "get_chat")?;
        Ok(self.bios.get(&user_id).map(|b| b.clone()))
    }

    async fn reply_to(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
    ) -> Result<(), TransportError> {
        Self::outcome(&self.fail_reply, "reply")?;
        self.replies
            .lock()
            .unwrap()
            .push((chat_id, message_id, text.to_string()));
        Ok(())
    }
}

#[async_trait]
impl RoleResolver for MockTransport {
    async fn is_admin(&self, chat_id: i64, user_id: u64) -> bool {
        self.admins.contains(&(chat_id, user_id))
    }
}
