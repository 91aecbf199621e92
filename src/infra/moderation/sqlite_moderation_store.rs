// SQLite-backed moderation store.
//
// Tables:
// - kv_settings: Per-chat policy settings as key/value strings
// - approved_users: Users exempt from filtering, per chat
// - warnings: Warning counters per (chat, user)

use crate::core::moderation::{ModerationError, ModerationStore};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteModerationStore {
    pool: Pool<Sqlite>,
}

fn storage_error(e: sqlx::Error) -> ModerationError {
    ModerationError::StorageError(e.to_string())
}

impl SqliteModerationStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_settings (
                chat_id INTEGER NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (chat_id, key)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS approved_users (
                chat_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                approved_at TEXT NOT NULL,
                PRIMARY KEY (chat_id, user_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warnings (
                chat_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (chat_id, user_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }
}

#[async_trait]
impl ModerationStore for SqliteModerationStore {
    async fn get_setting(&self, chat_id: i64, key: &str) -> Result<Option<String>, ModerationError> {
        let row = sqlx::query("SELECT value FROM kv_settings WHERE chat_id = ? AND key = ?")
            .bind(chat_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set_setting(
        &self,
        chat_id: i64,
        key: &str,
        value: &str,
    ) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            INSERT INTO kv_settings (chat_id, key, value)
            VALUES (?, ?, ?)
            ON CONFLICT(chat_id, key) DO UPDATE SET
                value = excluded.value
            "#,
        )
        .bind(chat_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn is_approved(&self, chat_id: i64, user_id: u64) -> Result<bool, ModerationError> {
        let row = sqlx::query("SELECT 1 FROM approved_users WHERE chat_id = ? AND user_id = ?")
            .bind(chat_id)
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(row.is_some())
    }

    async fn approve_user(&self, chat_id: i64, user_id: u64) -> Result<(), ModerationError> {
        sqlx::query(
            r#"
            INSERT INTO approved_users (chat_id, user_id, approved_at)
            VALUES (?, ?, ?)
            ON CONFLICT(chat_id, user_id) DO NOTHING
            "#,
        )
        .bind(chat_id)
        .bind(user_id as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn unapprove_user(&self, chat_id: i64, user_id: u64) -> Result<bool, ModerationError> {
        let result = sqlx::query("DELETE FROM approved_users WHERE chat_id = ? AND user_id = ?")
            .bind(chat_id)
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn approved_users(&self, chat_id: i64) -> Result<Vec<u64>, ModerationError> {
        let rows = sqlx::query(
            "SELECT user_id FROM approved_users WHERE chat_id = ? ORDER BY user_id",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(rows
            .iter()
            .map(|r| r.get::<i64, _>("user_id") as u64)
            .collect())
    }

    async fn increment_warning(&self, chat_id: i64, user_id: u64) -> Result<u32, ModerationError> {
        // Single statement so two concurrent increments can't read the same count.
        let row = sqlx::query(
            r#"
            INSERT INTO warnings (chat_id, user_id, count, updated_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(chat_id, user_id) DO UPDATE SET
                count = count + 1,
                updated_at = excluded.updated_at
            RETURNING count
            "#,
        )
        .bind(chat_id)
        .bind(user_id as i64)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        let count: i64 = row.get("count");
        Ok(count as u32)
    }

    async fn reset_warning(&self, chat_id: i64, user_id: u64) -> Result<(), ModerationError> {
        sqlx::query("DELETE FROM warnings WHERE chat_id = ? AND user_id = ?")
            .bind(chat_id)
            .bind(user_id as i64)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn get_warnings(&self, chat_id: i64, user_id: u64) -> Result<u32, ModerationError> {
        let row = sqlx::query("SELECT count FROM warnings WHERE chat_id = ? AND user_id = ?")
            .bind(chat_id)
            .bind(user_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(row.map(|r| r.get::<i64, _>("count") as u32).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::NamedTempFile;

    async fn memory_store() -> SqliteModerationStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteModerationStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_settings_upsert() {
        let store = memory_store().await;

        assert_eq!(store.get_setting(-100, "linkfilter").await.unwrap(), None);
        assert_eq!(
            store.get_setting_or(-100, "linkfilter", "0").await.unwrap(),
            "0"
        );

        store.set_setting(-100, "linkfilter", "1").await.unwrap();
        store.set_setting(-100, "linkfilter", "0").await.unwrap();
        store.set_setting(-200, "linkfilter", "1").await.unwrap();

        assert_eq!(
            store.get_setting(-100, "linkfilter").await.unwrap(),
            Some("0".to_string())
        );
        assert_eq!(
            store.get_setting(-200, "linkfilter").await.unwrap(),
            Some("1".to_string())
        );
    }

    #[tokio::test]
    async fn test_approvals() {
        let store = memory_store().await;

        assert!(!store.is_approved(-100, 7).await.unwrap());
        store.approve_user(-100, 7).await.unwrap();
        store.approve_user(-100, 7).await.unwrap();
        store.approve_user(-100, 3).await.unwrap();
        store.approve_user(-200, 9).await.unwrap();

        assert!(store.is_approved(-100, 7).await.unwrap());
        assert!(!store.is_approved(-200, 7).await.unwrap());
        assert_eq!(store.approved_users(-100).await.unwrap(), vec![3, 7]);

        assert!(store.unapprove_user(-100, 7).await.unwrap());
        assert!(!store.unapprove_user(-100, 7).await.unwrap());
        assert_eq!(store.approved_users(-100).await.unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_warning_counter() {
        let store = memory_store().await;

        assert_eq!(store.get_warnings(-100, 1).await.unwrap(), 0);
        assert_eq!(store.increment_warning(-100, 1).await.unwrap(), 1);
        assert_eq!(store.increment_warning(-100, 1).await.unwrap(), 2);
        assert_eq!(store.increment_warning(-100, 2).await.unwrap(), 1);
        assert_eq!(store.get_warnings(-100, 1).await.unwrap(), 2);

        store.reset_warning(-100, 1).await.unwrap();
        store.reset_warning(-100, 1).await.unwrap();
        assert_eq!(store.get_warnings(-100, 1).await.unwrap(), 0);
        assert_eq!(store.increment_warning(-100, 1).await.unwrap(), 1);
        assert_eq!(store.get_warnings(-100, 2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_owned();
        drop(tmp);
        let url = format!("sqlite://{}?mode=rwc", path.display());

        let pool = SqlitePoolOptions::new().connect(&url).await.unwrap();
        let store = SqliteModerationStore::new(pool.clone());
        store.migrate().await.unwrap();
        store.set_setting(-100, "biofilter", "1").await.unwrap();
        store.approve_user(-100, 5).await.unwrap();
        store.increment_warning(-100, 6).await.unwrap();
        pool.close().await;

        let pool = SqlitePoolOptions::new().connect(&url).await.unwrap();
        let store = SqliteModerationStore::new(pool);
        store.migrate().await.unwrap();
        assert_eq!(
            store.get_setting(-100, "biofilter").await.unwrap(),
            Some("1".to_string())
        );
        assert!(store.is_approved(-100, 5).await.unwrap());
        assert_eq!(store.get_warnings(-100, 6).await.unwrap(), 1);

        let _ = std::fs::remove_file(&path);
    }
}
