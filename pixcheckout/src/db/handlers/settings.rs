//! Database repository for the single-row `settings` table.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::{errors::Result, models::settings::SettingsRow};

/// One of the JSON columns of the settings row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSection {
    Payment,
    WhatsApp,
    Notification,
}

impl SettingsSection {
    fn column(&self) -> &'static str {
        match self {
            Self::Payment => "payment_settings",
            Self::WhatsApp => "whatsapp_settings",
            Self::Notification => "notification_settings",
        }
    }
}

pub struct Settings<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Settings<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get(&mut self) -> Result<SettingsRow> {
        // The migration seeds the row; upsert in case it was deleted by a restore.
        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            INSERT INTO settings (id) VALUES (TRUE)
            ON CONFLICT (id) DO UPDATE SET id = settings.id
            RETURNING payment_settings, whatsapp_settings, notification_settings, updated_at
            "#,
        )
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row)
    }

    /// Replace one section of the settings row.
    #[instrument(skip(self, value), fields(section = section.column()), err)]
    pub async fn update(&mut self, section: SettingsSection, value: &serde_json::Value) -> Result<SettingsRow> {
        let query = format!(
            r#"
            INSERT INTO settings (id, {column}) VALUES (TRUE, $1)
            ON CONFLICT (id) DO UPDATE SET {column} = EXCLUDED.{column}, updated_at = NOW()
            RETURNING payment_settings, whatsapp_settings, notification_settings, updated_at
            "#,
            column = section.column()
        );
        let row = sqlx::query_as::<_, SettingsRow>(&query)
            .bind(value)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(row)
    }
}
