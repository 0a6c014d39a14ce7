//! Management API, mounted at `/admin/api/v1`. Every endpoint requires an admin session.

use utoipa::OpenApi;

use crate::api::handlers::{
    analytics, audit_logs, automation, backups, coupons, customers, files, jobs, messaging, notifications, orders, payment_links,
    products, reports, security, settings,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        orders::list_orders,
        orders::get_order,
        orders::update_order_status,
        orders::cancel_order,
        customers::list_customers,
        customers::get_customer,
        coupons::list_coupons,
        coupons::get_coupon,
        coupons::create_coupon,
        coupons::update_coupon,
        coupons::delete_coupon,
        payment_links::create_payment_link,
        payment_links::list_payment_links,
        payment_links::deactivate_payment_link,
        notifications::list_notifications,
        notifications::mark_notification_read,
        notifications::mark_all_notifications_read,
        notifications::delete_notification,
        audit_logs::list_audit_logs,
        settings::get_settings,
        settings::update_payment_settings,
        settings::update_whatsapp_settings,
        settings::update_notification_settings,
        messaging::send_email,
        messaging::list_email_logs,
        messaging::send_whatsapp,
        messaging::list_whatsapp_logs,
        messaging::resend_failed_whatsapp,
        reports::list_schedules,
        reports::create_schedule,
        reports::get_schedule,
        reports::update_schedule,
        reports::delete_schedule,
        reports::generate_report,
        reports::list_report_logs,
        reports::dashboard_stats,
        reports::send_daily_summary,
        analytics::track_event,
        analytics::list_events,
        analytics::calculate_metrics,
        analytics::metric_history,
        analytics::generate_prediction,
        analytics::list_dashboards,
        analytics::create_dashboard,
        analytics::delete_dashboard,
        analytics::dashboard_data,
        automation::list_workflows,
        automation::create_workflow,
        automation::get_workflow,
        automation::update_workflow,
        automation::delete_workflow,
        automation::execute_workflow,
        automation::list_rules,
        automation::create_rule,
        automation::get_rule,
        automation::update_rule,
        automation::delete_rule,
        automation::evaluate_rules,
        automation::list_executions,
        files::upload_file,
        files::list_files,
        files::get_file,
        files::download_file,
        files::update_file_metadata,
        files::delete_file,
        backups::create_backup,
        backups::list_backup_logs,
        backups::restore_backup,
        backups::restore_uploaded_backup,
        security::list_blocked_ips,
        security::block_ip,
        security::unblock_ip,
        security::list_login_attempts,
        jobs::expire_orders,
    ),
    tags(
        (name = "products", description = "Catalog management"),
        (name = "orders", description = "Order lookup and manual status changes"),
        (name = "customers", description = "Buyers captured at checkout"),
        (name = "coupons", description = "Discount codes"),
        (name = "payment_links", description = "Shareable checkout links"),
        (name = "notifications", description = "Admin inbox"),
        (name = "audit", description = "Record of admin changes"),
        (name = "settings", description = "Gateway, WhatsApp and notification settings"),
        (name = "messaging", description = "Email and WhatsApp delivery with logs"),
        (name = "reports", description = "Scheduled reports and dashboard figures"),
        (name = "analytics", description = "Events, metrics, forecasts and dashboards"),
        (name = "automation", description = "Workflows and rules"),
        (name = "files", description = "Uploaded files"),
        (name = "backups", description = "Database backups and restores"),
        (name = "security", description = "Blocked IPs and login attempts"),
        (name = "jobs", description = "Maintenance jobs"),
    )
)]
pub struct AdminApiDoc;
