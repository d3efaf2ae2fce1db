//! Turns received alertmanager notifications into discord messages and hands
//! them to the [Dispatcher].
//!
//! Every alert is sent as its own message. Alerts are grouped by status first
//! so the group color and the optional group header are only computed once.

use std::time::Duration;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use prometheus::IntCounterVec;
use serde_json::Value;

use crate::{
	alert::{Alert, AlertGroupNotification, AlertStatus},
	alert_renderer::{group_display_name, AlertRenderer},
	dispatcher::Dispatcher,
	log::PAYLOAD_TARGET,
};

/// default delay after each sent alert
pub const DEFAULT_MESSAGE_DELAY: Duration = Duration::from_millis(200);

/// received bodies are logged up to this many bytes
const MAX_LOGGED_BODY_LEN: usize = 1024;

/// prometheus meters for received notifications
struct RelayMetrics {
	/// deserialized notifications by group status
	notifications: IntCounterVec,
	/// deserialized alerts by alert status
	alerts: IntCounterVec,
	/// bodies that couldn't be deserialized
	malformed: IntCounterVec,
}

impl RelayMetrics {
	pub fn new() -> Result<Self, prometheus::Error> {
		use prometheus::{opts, register_int_counter_vec};

		let notifications = register_int_counter_vec!(
			opts!("received_notifications", "total number of deserialized notifications")
				.namespace("alertmanager_discord")
				.subsystem("alertmanager_webhook"),
			&["status"]
		)?;

		let alerts = register_int_counter_vec!(
			opts!("received_alerts", "total number of deserialized alerts")
				.namespace("alertmanager_discord")
				.subsystem("alertmanager_webhook"),
			&["status"]
		)?;

		let malformed = register_int_counter_vec!(
			opts!("malformed_requests", "requests that couldn't be deserialized")
				.namespace("alertmanager_discord")
				.subsystem("alertmanager_webhook"),
			&["kind"]
		)?;

		Ok(Self { notifications, alerts, malformed })
	}
}

#[allow(clippy::expect_used)]
static METRICS: Lazy<RelayMetrics> =
	Lazy::new(|| RelayMetrics::new().expect("failed to register relay meters"));

/// What happened to a received request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	/// the body was a notification, see [RelaySummary]
	Relayed(RelaySummary),
	/// raw prometheus alerts were posted, a warning was sent instead
	Misconfigured,
	/// the body couldn't be deserialized and was dropped
	Malformed,
}

/// Counts of a relayed notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaySummary {
	/// messages handed to the dispatcher
	pub sent: usize,
	/// alerts that didn't render into a meaningful message
	pub skipped: usize,
}

/// Read-only state shared by all requests
pub struct Relay {
	renderer: AlertRenderer,
	dispatcher: Dispatcher,

	/// wait time after each sent message
	message_delay: Duration,
	/// send a header message before the alerts of each status group
	group_header: bool,
}

impl Relay {
	pub fn new(
		renderer: AlertRenderer,
		dispatcher: Dispatcher,
		message_delay: Duration,
		group_header: bool,
	) -> Self {
		Self { renderer, dispatcher, message_delay, group_header }
	}

	/// Handles a raw request body.
	///
	/// Bodies that aren't notifications are logged and dropped, unless they
	/// are raw prometheus alerts. In that case the primary webhook is told
	/// that the relay is misconfigured.
	pub async fn handle_body(&self, body: &[u8]) -> Outcome {
		tracing::debug!(
			target: PAYLOAD_TARGET,
			"request payload: {}",
			String::from_utf8_lossy(body)
		);

		match serde_json::from_slice::<AlertGroupNotification>(body) {
			Ok(data) => Outcome::Relayed(self.relay(&data).await),
			Err(err) if is_raw_prometheus_alert(body) => {
				tracing::debug!("raw prometheus alert: {err}");
				METRICS.malformed.with_label_values(&["raw_prometheus_alert"]).inc();
				self.warn_misconfigured().await;
				Outcome::Misconfigured
			}
			Err(err) => {
				METRICS.malformed.with_label_values(&["invalid"]).inc();
				tracing::warn!(
					"failed to unpack inbound alert request ({err}) - {}",
					truncated_body(body)
				);
				Outcome::Malformed
			}
		}
	}

	/// Renders and sends every alert of a notification.
	pub async fn relay(&self, data: &AlertGroupNotification) -> RelaySummary {
		METRICS.notifications.with_label_values(&[data.status.as_str()]).inc();

		let mut summary = RelaySummary::default();

		for (status, alerts) in group_by_status(&data.alerts) {
			METRICS.alerts.with_label_values(&[status.as_str()]).inc_by(alerts.len() as u64);
			tracing::info!(
				"relaying {} {status} alert(s) of {}",
				alerts.len(),
				group_display_name(data)
			);

			if self.group_header {
				let header = self.renderer.render_group_header(data, status);
				self.dispatcher.send(&header).await;
				self.pause().await;
			}

			for (i, alert) in alerts.iter().enumerate() {
				let message = match self.renderer.render_alert(alert, status) {
					Some(message) => message,
					None => {
						summary.skipped += 1;
						continue;
					}
				};

				tracing::info!("sending individual alert (alert {}/{})", i + 1, alerts.len());
				self.dispatcher.send(&message).await;
				summary.sent += 1;

				self.pause().await;
			}
		}

		summary
	}

	/// Sends the misconfiguration warning to the primary webhook
	async fn warn_misconfigured(&self) {
		tracing::error!("/!\\ -- You have misconfigured this program -- /!\\");
		tracing::error!("--- --                                      -- ---");
		tracing::error!("{}", crate::alert_renderer::MISCONFIGURED_WARNING);

		self.dispatcher.send_primary(&self.renderer.misconfiguration_warning()).await;
	}

	async fn pause(&self) {
		if !self.message_delay.is_zero() {
			tokio::time::sleep(self.message_delay).await;
		}
	}
}

/// Groups alerts by status. Statuses keep the order they are first seen in,
/// alerts keep their order within a group.
pub fn group_by_status(alerts: &[Alert]) -> IndexMap<&AlertStatus, Vec<&Alert>> {
	let mut groups: IndexMap<&AlertStatus, Vec<&Alert>> = IndexMap::new();

	for alert in alerts {
		groups.entry(&alert.status).or_default().push(alert);
	}

	groups
}

/// Prometheus posts a plain list of alerts with labels to its alertmanagers.
/// Such a body means prometheus was pointed at the relay directly.
pub fn is_raw_prometheus_alert(body: &[u8]) -> bool {
	match serde_json::from_slice::<Value>(body) {
		Ok(Value::Array(alerts)) => {
			!alerts.is_empty()
				&& alerts.iter().all(|alert| alert.get("labels").map_or(false, Value::is_object))
		}
		_ => false,
	}
}

/// lossy utf-8 rendering of the first [MAX_LOGGED_BODY_LEN] bytes of `body`
fn truncated_body(body: &[u8]) -> String {
	if body.len() > MAX_LOGGED_BODY_LEN {
		format!("{}...", String::from_utf8_lossy(&body[..MAX_LOGGED_BODY_LEN - 1]))
	} else {
		String::from_utf8_lossy(body).into_owned()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn alert(status: &str, name: &str) -> Alert {
		Alert {
			status: status.into(),
			labels: [("alertname", name)].into_iter().collect(),
			..Default::default()
		}
	}

	#[test]
	fn groups_keep_first_seen_order() {
		let alerts = vec![
			alert("resolved", "a"),
			alert("firing", "b"),
			alert("resolved", "c"),
			alert("suppressed", "d"),
		];

		let groups = group_by_status(&alerts);
		let statuses: Vec<_> = groups.keys().map(|status| status.as_str()).collect();
		assert_eq!(statuses, ["resolved", "firing", "suppressed"]);

		let resolved: Vec<_> = groups[&AlertStatus::Resolved]
			.iter()
			.map(|alert| alert.labels.get("alertname").unwrap())
			.collect();
		assert_eq!(resolved, ["a", "c"]);
	}

	#[test]
	fn detects_raw_prometheus_alerts() {
		assert!(is_raw_prometheus_alert(
			br#"[{"labels": {"alertname": "DiskSpace"}, "annotations": {}}]"#
		));
		assert!(!is_raw_prometheus_alert(b"[]"));
		assert!(!is_raw_prometheus_alert(br#"[{"name": "x"}]"#));
		assert!(!is_raw_prometheus_alert(br#"{"labels": {}}"#));
		assert!(!is_raw_prometheus_alert(b"not json"));
	}

	#[test]
	fn long_bodies_are_truncated_for_logging() {
		let body = vec![b'x'; 2000];

		let logged = truncated_body(&body);

		assert_eq!(logged.len(), 1026);
		assert!(logged.ends_with("x..."));
		assert_eq!(truncated_body(b"short"), "short");
	}
}
