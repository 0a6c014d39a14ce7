//! Scheduled reports.
//!
//! A report covers the last 30 days of sales, products or customers. Generation renders the
//! data to CSV or HTML, stores the file in the `reports` bucket, emails a link to every
//! recipient, advances the schedule and writes a `report_logs` row whatever the outcome.
//!
//! [`run_scheduler`] polls for due schedules and generates them in turn.

pub mod render;

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::{
    AppState,
    analytics::conversion_rate,
    db::{
        handlers::{ReportLogs, ReportSchedules, Repository, analytics},
        models::{
            file_storage::FileStorageRequest,
            files::FileMetadata,
            reports::{ReportFormat, ReportFrequency, ReportLog, ReportLogCreateDBRequest, ReportSchedule, ReportType},
        },
    },
    email::EmailTemplate,
    errors::{Error, Result},
    settings, storage,
    types::ReportScheduleId,
};
use render::ReportTable;

pub const REPORTS_BUCKET: &str = "reports";
const REPORT_WINDOW_DAYS: i64 = 30;

fn brl(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

/// Lower-case ASCII letters and digits, everything else collapsed to single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() { "report".to_string() } else { slug.to_string() }
}

pub fn report_file_name(name: &str, format: ReportFormat, at: DateTime<Utc>) -> String {
    format!("{}-{}.{}", slugify(name), at.format("%Y-%m-%d-%H-%M"), format.extension())
}

/// Collect the data for one report type over `[start, end)`.
#[instrument(skip(state), err)]
pub async fn build_table(state: &AppState, report_type: ReportType, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<ReportTable> {
    let pool = &state.db;
    let table = match report_type {
        ReportType::Sales => {
            let totals = analytics::order_totals(pool, start, end).await?;
            let statuses = analytics::status_distribution(pool, start, end).await?;
            let days = analytics::sales_by_day(pool, start, end).await?;

            let average_ticket = if totals.paid_orders > 0 {
                totals.total_sales / Decimal::from(totals.paid_orders)
            } else {
                Decimal::ZERO
            };
            let mut summary = vec![
                ("total_sales".to_string(), brl(totals.total_sales)),
                ("total_orders".to_string(), totals.total_orders.to_string()),
                ("paid_orders".to_string(), totals.paid_orders.to_string()),
                ("average_ticket".to_string(), brl(average_ticket)),
                (
                    "conversion_rate".to_string(),
                    conversion_rate(totals.paid_orders, totals.total_orders).to_string(),
                ),
            ];
            summary.extend(statuses.iter().map(|s| (format!("status_{}", s.status), s.count.to_string())));

            ReportTable {
                title: "Relatório de Vendas".to_string(),
                summary,
                headers: vec!["day".into(), "orders".into(), "revenue".into()],
                rows: days
                    .iter()
                    .map(|d| vec![d.day.to_string(), d.orders.to_string(), brl(d.revenue)])
                    .collect(),
            }
        }
        ReportType::Products => {
            let products = analytics::product_sales(pool, start, end).await?;
            let active = products.iter().filter(|p| p.active).count();
            let mut summary = vec![
                ("total_products".to_string(), products.len().to_string()),
                ("active_products".to_string(), active.to_string()),
            ];
            let mut by_type = std::collections::BTreeMap::<&str, usize>::new();
            for p in &products {
                *by_type.entry(p.product_type.as_str()).or_default() += 1;
            }
            summary.extend(by_type.into_iter().map(|(t, n)| (format!("type_{t}"), n.to_string())));

            ReportTable {
                title: "Relatório de Produtos".to_string(),
                summary,
                headers: vec!["name".into(), "type".into(), "active".into(), "orders".into(), "sales".into(), "revenue".into()],
                rows: products
                    .iter()
                    .map(|p| {
                        vec![
                            p.name.clone(),
                            p.product_type.as_str().to_string(),
                            p.active.to_string(),
                            p.orders.to_string(),
                            p.sales.to_string(),
                            brl(p.revenue),
                        ]
                    })
                    .collect(),
            }
        }
        ReportType::Customers => {
            let customers = analytics::customer_sales(pool, start, end).await?;
            let new_customers = analytics::customers_created_since(pool, start).await?;

            ReportTable {
                title: "Relatório de Clientes".to_string(),
                summary: vec![
                    ("total_customers".to_string(), customers.len().to_string()),
                    ("new_customers".to_string(), new_customers.to_string()),
                ],
                headers: vec!["name".into(), "email".into(), "orders".into(), "total_spent".into(), "average_ticket".into()],
                rows: customers
                    .iter()
                    .map(|c| {
                        let average = if c.orders > 0 {
                            c.total_spent / Decimal::from(c.orders)
                        } else {
                            Decimal::ZERO
                        };
                        vec![c.name.clone(), c.email.clone(), c.orders.to_string(), brl(c.total_spent), brl(average)]
                    })
                    .collect(),
            }
        }
    };
    Ok(table)
}

pub fn render(table: &ReportTable, format: ReportFormat) -> Result<Vec<u8>> {
    match format {
        ReportFormat::Csv => Ok(render::to_csv(table).into_bytes()),
        ReportFormat::Html => Ok(render::to_html(table)?.into_bytes()),
        ReportFormat::Pdf | ReportFormat::Excel => Err(Error::BadRequest {
            message: format!("Unsupported report format: {}", format.as_str()),
        }),
    }
}

struct Generated {
    file_url: String,
    data_count: usize,
}

fn parse_schedule(schedule: &ReportSchedule) -> Result<(ReportType, ReportFormat, ReportFrequency)> {
    let invalid = |message: String| Error::BadRequest { message };
    Ok((
        schedule.report_type.parse().map_err(invalid)?,
        schedule.format.parse().map_err(invalid)?,
        schedule.frequency.parse().map_err(invalid)?,
    ))
}

async fn produce(state: &AppState, schedule: &ReportSchedule, now: DateTime<Utc>) -> Result<Generated> {
    let (report_type, format, _) = parse_schedule(schedule)?;
    let start = now - chrono::Duration::days(REPORT_WINDOW_DAYS);
    let table = build_table(state, report_type, start, now).await?;
    let content = render(&table, format)?;

    let file_name = report_file_name(&schedule.name, format, now);
    let stored = storage::save_file(
        state,
        FileStorageRequest {
            bucket: REPORTS_BUCKET.to_string(),
            path: file_name.clone(),
            content,
            content_type: format.mime_type().to_string(),
        },
        FileMetadata {
            original_name: Some(file_name),
            description: Some(schedule.name.clone()),
            tags: vec!["report".to_string()],
            related_id: Some(schedule.id.to_string()),
            related_type: Some("report_schedule".to_string()),
        },
    )
    .await?;
    let file_url = storage::download_url(&state.config, stored.id);

    for recipient in &schedule.recipients {
        let data = json!({"report_name": schedule.name, "report_url": file_url});
        if let Err(e) = state
            .email
            .send(&state.db, recipient, &[], EmailTemplate::ScheduledReport, &data)
            .await
        {
            tracing::warn!(schedule_id = %schedule.id, recipient, error = %e, "Report email failed");
        }
    }

    Ok(Generated {
        file_url,
        data_count: table.rows.len(),
    })
}

/// Generate one scheduled report now. The schedule is advanced and the run logged even when
/// generation fails; the failure is then returned.
#[instrument(skip(state), err)]
pub async fn generate(state: &AppState, schedule_id: ReportScheduleId) -> Result<ReportLog> {
    let schedule = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        ReportSchedules::new(&mut conn)
            .get_by_id(schedule_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Report schedule".to_string(),
                id: schedule_id.to_string(),
            })?
    };

    let now = Utc::now();
    let outcome = produce(state, &schedule, now).await;

    let next_run = schedule
        .frequency
        .parse::<ReportFrequency>()
        .unwrap_or(ReportFrequency::Daily)
        .next_run(now);

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ReportSchedules::new(&mut conn).mark_run(schedule.id, now, next_run).await?;

    let metadata = json!({
        "report_type": schedule.report_type,
        "format": schedule.format,
        "data_count": outcome.as_ref().map(|g| g.data_count).unwrap_or(0),
    });
    let log = ReportLogs::new(&mut conn)
        .create(&ReportLogCreateDBRequest {
            schedule_id: schedule.id,
            success: outcome.is_ok(),
            recipients: schedule.recipients.clone(),
            file_url: outcome.as_ref().ok().map(|g| g.file_url.clone()),
            metadata,
            error: outcome.as_ref().err().map(|e| e.user_message()),
        })
        .await?;

    match outcome {
        Ok(_) => {
            info!(schedule_id = %schedule.id, name = %schedule.name, "Generated report");
            Ok(log)
        }
        Err(e) => Err(e),
    }
}

/// Generate every due schedule. Returns how many ran successfully.
#[instrument(skip(state), err)]
pub async fn run_due(state: &AppState) -> Result<usize> {
    let due = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        ReportSchedules::new(&mut conn).due(Utc::now()).await?
    };

    let mut succeeded = 0;
    for schedule in due {
        match generate(state, schedule.id).await {
            Ok(_) => succeeded += 1,
            Err(e) => tracing::error!(schedule_id = %schedule.id, error = %e, "Scheduled report failed"),
        }
    }
    Ok(succeeded)
}

/// Poll for due reports every `poll_interval` until cancelled.
pub async fn run_scheduler(state: AppState, poll_interval: Duration, shutdown: CancellationToken) {
    info!(poll_interval = ?poll_interval, "Starting report scheduler");
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_due(&state).await {
                    tracing::error!(error = %e, "Report scheduler pass failed");
                }
            }
            _ = shutdown.cancelled() => {
                info!("Report scheduler stopped");
                return;
            }
        }
    }
}

/// Email yesterday-to-now order figures to the configured summary recipients. Returns how many
/// emails were delivered.
#[instrument(skip(state), err)]
pub async fn send_daily_summary(state: &AppState) -> Result<usize> {
    let app_settings = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        settings::load(&mut conn, &state.cipher).await?
    };
    let recipients = &app_settings.notification_settings.daily_summary_recipients;
    if recipients.is_empty() {
        return Ok(0);
    }

    let end = Utc::now();
    let totals = analytics::order_totals(&state.db, end - chrono::Duration::days(1), end).await?;
    let data = json!({
        "newOrders": totals.total_orders,
        "confirmedPayments": totals.paid_orders,
        "totalAmount": brl(totals.total_sales),
        "date": end.format("%d/%m/%Y").to_string(),
    });

    let mut delivered = 0;
    for recipient in recipients {
        match state
            .email
            .send(&state.db, recipient, &[], EmailTemplate::DailySummary, &data)
            .await
        {
            Ok(_) => delivered += 1,
            Err(e) => tracing::warn!(recipient, error = %e, "Daily summary email failed"),
        }
    }
    Ok(delivered)
}
