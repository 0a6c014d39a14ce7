//! Typed access to the runtime settings row.
//!
//! Gateway and WhatsApp credentials are encrypted with [`SecretCipher`] before they are written
//! and decrypted on read. API responses use [`AppSettings::masked`], and an update that echoes a
//! masked value back keeps the stored secret.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use tracing::instrument;
use utoipa::ToSchema;

use crate::crypto::{SecretCipher, mask_secret};
use crate::db::handlers::settings::{Settings, SettingsSection};
use crate::db::models::settings::{NotificationSettings, PaymentSettings, SettingsRow, WhatsAppSettings};
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct AppSettings {
    pub payment_settings: PaymentSettings,
    pub whatsapp_settings: WhatsAppSettings,
    pub notification_settings: NotificationSettings,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AppSettings {
    /// Copy with every secret replaced by its masked form.
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        let mask = |v: &mut Option<String>| {
            if let Some(s) = v.as_mut() {
                *s = mask_secret(s);
            }
        };
        mask(&mut masked.payment_settings.primepag_token);
        mask(&mut masked.payment_settings.webhook_secret);
        mask(&mut masked.whatsapp_settings.api_key);
        masked
    }
}

fn is_masked(value: &str) -> bool {
    value.starts_with("****")
}

/// Decrypt an optional secret. Empty strings are treated as unset.
fn open(cipher: &SecretCipher, value: &Option<String>) -> Result<Option<String>> {
    match value.as_deref() {
        None | Some("") => Ok(None),
        Some(v) => cipher
            .decrypt(v)
            .map(Some)
            .map_err(|e| Error::Internal {
                operation: format!("decrypt stored secret: {e}"),
            }),
    }
}

/// Encrypt an incoming secret, keeping `current` when the client sent back the masked value.
fn seal(cipher: &SecretCipher, incoming: &Option<String>, current: &Option<String>) -> Result<Option<String>> {
    match incoming.as_deref() {
        None | Some("") => Ok(None),
        Some(v) if is_masked(v) => Ok(current.clone()),
        Some(v) => cipher.encrypt(v).map(Some).map_err(|e| Error::Internal {
            operation: format!("encrypt secret: {e}"),
        }),
    }
}

fn parse<T: serde::de::DeserializeOwned + Default>(value: &serde_json::Value) -> T {
    serde_json::from_value(value.clone()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Stored settings section does not parse, using defaults");
        T::default()
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| Error::Internal {
        operation: format!("serialize settings: {e}"),
    })
}

fn decode(row: &SettingsRow, cipher: &SecretCipher) -> Result<AppSettings> {
    let mut payment: PaymentSettings = parse(&row.payment_settings);
    payment.primepag_token = open(cipher, &payment.primepag_token)?;
    payment.webhook_secret = open(cipher, &payment.webhook_secret)?;

    let mut whatsapp: WhatsAppSettings = parse(&row.whatsapp_settings);
    whatsapp.api_key = open(cipher, &whatsapp.api_key)?;

    Ok(AppSettings {
        payment_settings: payment,
        whatsapp_settings: whatsapp,
        notification_settings: parse(&row.notification_settings),
        updated_at: Some(row.updated_at),
    })
}

/// Load and decrypt the settings row.
#[instrument(skip_all, err)]
pub async fn load(conn: &mut PgConnection, cipher: &SecretCipher) -> Result<AppSettings> {
    let row = Settings::new(conn).get().await?;
    decode(&row, cipher)
}

#[instrument(skip_all, err)]
pub async fn update_payment(conn: &mut PgConnection, cipher: &SecretCipher, incoming: &PaymentSettings) -> Result<AppSettings> {
    let row = Settings::new(&mut *conn).get().await?;
    let current: PaymentSettings = parse(&row.payment_settings);

    let stored = PaymentSettings {
        primepag_token: seal(cipher, &incoming.primepag_token, &current.primepag_token)?,
        webhook_secret: seal(cipher, &incoming.webhook_secret, &current.webhook_secret)?,
        ..incoming.clone()
    };
    let row = Settings::new(conn).update(SettingsSection::Payment, &to_json(&stored)?).await?;
    decode(&row, cipher)
}

#[instrument(skip_all, err)]
pub async fn update_whatsapp(conn: &mut PgConnection, cipher: &SecretCipher, incoming: &WhatsAppSettings) -> Result<AppSettings> {
    let row = Settings::new(&mut *conn).get().await?;
    let current: WhatsAppSettings = parse(&row.whatsapp_settings);

    let stored = WhatsAppSettings {
        api_key: seal(cipher, &incoming.api_key, &current.api_key)?,
        ..incoming.clone()
    };
    let row = Settings::new(conn).update(SettingsSection::WhatsApp, &to_json(&stored)?).await?;
    decode(&row, cipher)
}

#[instrument(skip_all, err)]
pub async fn update_notification(
    conn: &mut PgConnection,
    cipher: &SecretCipher,
    incoming: &NotificationSettings,
) -> Result<AppSettings> {
    let row = Settings::new(conn)
        .update(SettingsSection::Notification, &to_json(incoming)?)
        .await?;
    decode(&row, cipher)
}
