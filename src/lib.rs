//! prometheus alertmanager receiver that forwards alerts to discord webhooks
//!
//! Features:
//! - every alert is rendered into its own discord embed
//! - messages are checked against discord's limits before they are sent
//! - messages are fanned out to any number of additional webhooks

pub mod alert;
pub mod alert_renderer;
pub mod alertmanager_webhook_receiver;
pub mod dispatcher;
pub mod http_client;
pub mod log;
pub mod relay;
pub mod rendered_alert;
pub mod sanitize;
pub mod settings;
pub mod telemetry_endpoint;
pub mod webhook_url;
