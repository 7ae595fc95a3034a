use super::schema::Database;
use super::types::{DatabaseError, Settings};

const SETTINGS_COLUMNS: &str = "user_id, unread_only, mark_same_read, rss_enabled, \
     show_preview_button, show_tab_button, show_read_button, show_link_button, show_bookmark_button";

impl Database {
    // ========================================================================
    // User Settings Operations
    // ========================================================================

    /// Settings for `user_id`, or all-false defaults when none are stored
    pub async fn get_settings(&self, user_id: i64) -> Result<Settings, DatabaseError> {
        let sql = format!("SELECT {SETTINGS_COLUMNS} FROM settings WHERE user_id = ?");
        let row = sqlx::query_as::<_, Settings>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.unwrap_or_else(|| Settings::defaults_for(user_id)))
    }

    /// Replace the settings of `settings.user_id`.
    ///
    /// Delete and insert run in one transaction, so a failure can never leave
    /// the user without a settings row.
    pub async fn replace_settings(&self, settings: &Settings) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM settings WHERE user_id = ?")
            .bind(settings.user_id)
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "INSERT INTO settings ({SETTINGS_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        sqlx::query(&sql)
            .bind(settings.user_id)
            .bind(settings.unread_only)
            .bind(settings.mark_same_read)
            .bind(settings.rss_enabled)
            .bind(settings.show_preview_button)
            .bind(settings.show_tab_button)
            .bind(settings.show_read_button)
            .bind(settings.show_link_button)
            .bind(settings.show_bookmark_button)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, Settings};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_settings_are_defaults() {
        let db = test_db().await;
        let settings = db.get_settings(5).await.unwrap();
        assert_eq!(settings, Settings::defaults_for(5));
        assert!(!settings.unread_only);
        assert!(!settings.mark_same_read);
    }

    #[tokio::test]
    async fn test_replace_settings_round_trip() {
        let db = test_db().await;
        let settings = Settings {
            unread_only: true,
            show_link_button: true,
            ..Settings::defaults_for(5)
        };
        db.replace_settings(&settings).await.unwrap();
        assert_eq!(db.get_settings(5).await.unwrap(), settings);

        let updated = Settings {
            mark_same_read: true,
            ..Settings::defaults_for(5)
        };
        db.replace_settings(&updated).await.unwrap();
        assert_eq!(db.get_settings(5).await.unwrap(), updated);

        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM settings WHERE user_id = 5")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_settings_are_per_user() {
        let db = test_db().await;
        db.replace_settings(&Settings {
            unread_only: true,
            ..Settings::defaults_for(1)
        })
        .await
        .unwrap();

        assert!(db.get_settings(1).await.unwrap().unread_only);
        assert!(!db.get_settings(2).await.unwrap().unread_only);
    }
}
