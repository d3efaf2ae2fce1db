//! The [Dispatcher] posts rendered messages to the primary webhook and every
//! additional webhook. Destinations are tried one after another, a failing
//! destination never stops delivery to the others.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use once_cell::sync::Lazy;
use prometheus::IntCounterVec;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::{
	http_client::{WebhookClient, WebhookResponse},
	log::PAYLOAD_TARGET,
	rendered_alert::{OutboundMessage, ValidationError},
};

/// default delay before every single webhook request
pub const DEFAULT_POST_DELAY: Duration = Duration::from_millis(100);

/// prometheus meters of the dispatcher
struct DispatcherMetrics {
	/// messages dropped because they failed validation
	rejected: IntCounterVec,
	/// delivery attempts per destination host and outcome
	deliveries: IntCounterVec,
}

impl DispatcherMetrics {
	pub fn new() -> Result<Self, prometheus::Error> {
		use prometheus::{opts, register_int_counter_vec};

		let rejected = register_int_counter_vec!(
			opts!("rejected_messages", "messages dropped because they exceed discord limits")
				.namespace("alertmanager_discord")
				.subsystem("dispatcher"),
			&["reason"]
		)?;

		let deliveries = register_int_counter_vec!(
			opts!("deliveries_total", "delivery attempts per destination")
				.namespace("alertmanager_discord")
				.subsystem("dispatcher"),
			&["host", "outcome"]
		)?;

		Ok(Self { rejected, deliveries })
	}
}

#[allow(clippy::expect_used)]
static METRICS: Lazy<DispatcherMetrics> =
	Lazy::new(|| DispatcherMetrics::new().expect("failed to register dispatcher meters"));

/// Reasons a single delivery failed
#[derive(Error, Debug)]
pub enum DispatchError {
	#[error("http error: {0}")]
	Http(#[from] reqwest::Error),
	#[error("discord api error (status {status}): {body}")]
	Status { status: StatusCode, body: String },
	#[error("failed to serialize message: {0}")]
	Serialize(#[from] serde_json::Error),
}

/// Outcome of [Dispatcher::send]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
	/// the message failed validation and wasn't sent anywhere
	pub rejected: Option<ValidationError>,
	/// destinations that accepted the message
	pub delivered: usize,
	/// destinations that failed
	pub failed: usize,
}

/// Sends messages to all configured webhooks
#[derive(Clone)]
pub struct Dispatcher {
	client: Arc<dyn WebhookClient>,

	/// the webhook every message is sent to first
	primary: Url,
	/// additional webhooks, tried in order after the primary
	secondary: Vec<Url>,

	/// wait time before each request
	post_delay: Duration,
	/// upper bound for the text of a message
	max_message_chars: usize,
}

impl Dispatcher {
	/// Constructs a [Dispatcher]
	///
	/// # Arguments
	///
	/// * `client` - used to make the http requests
	///
	/// * `primary` - the main webhook
	///
	/// * `secondary` - additional webhooks
	///
	/// * `post_delay` - delay before every request
	///
	/// * `max_message_chars` - limit passed to [OutboundMessage::validate]
	pub fn new(
		client: Arc<dyn WebhookClient>,
		primary: Url,
		secondary: Vec<Url>,
		post_delay: Duration,
		max_message_chars: usize,
	) -> Self {
		Self { client, primary, secondary, post_delay, max_message_chars }
	}

	/// all destinations in delivery order
	pub fn destinations(&self) -> impl Iterator<Item = &Url> {
		std::iter::once(&self.primary).chain(self.secondary.iter())
	}

	/// Validates `message` and posts it to every destination. Failures are
	/// logged and reported, never returned as errors.
	pub async fn send(&self, message: &OutboundMessage) -> DispatchReport {
		let destinations: Vec<&Url> = self.destinations().collect();
		self.send_to(message, &destinations).await
	}

	/// Validates `message` and posts it to the primary webhook only.
	pub async fn send_primary(&self, message: &OutboundMessage) -> DispatchReport {
		self.send_to(message, &[&self.primary]).await
	}

	async fn send_to(&self, message: &OutboundMessage, destinations: &[&Url]) -> DispatchReport {
		let mut report = DispatchReport::default();

		if let Err(err) = message.validate(self.max_message_chars) {
			tracing::warn!("invalid discord message structure, skipping send: {err}");
			METRICS.rejected.with_label_values(&[err.kind()]).inc();
			report.rejected = Some(err);
			return report;
		}

		let body = match serde_json::to_vec(message) {
			Ok(body) => Bytes::from(body),
			Err(err) => {
				tracing::error!("{}", DispatchError::from(err));
				report.failed = destinations.len();
				return report;
			}
		};

		tracing::debug!(
			target: PAYLOAD_TARGET,
			"sending webhook message: {}",
			String::from_utf8_lossy(&body)
		);

		for url in destinations {
			let host = url.host_str().unwrap_or_default();

			match self.post(url, body.clone()).await {
				Ok(response) => {
					tracing::info!("successfully sent to {host} (status: {})", response.status);
					tracing::debug!(target: PAYLOAD_TARGET, "discord response: {}", response.body);
					METRICS.deliveries.with_label_values(&[host, "delivered"]).inc();
					report.delivered += 1;
				}
				Err(err) => {
					tracing::warn!("failed to send to {host}: {err}");
					if let DispatchError::Status { status, .. } = &err {
						log_status_hint(*status);
					}
					METRICS.deliveries.with_label_values(&[host, "failed"]).inc();
					report.failed += 1;
				}
			}
		}

		report
	}

	/// Waits [Self::post_delay] and posts `body` to `url`
	async fn post(&self, url: &Url, body: Bytes) -> Result<WebhookResponse, DispatchError> {
		if !self.post_delay.is_zero() {
			tokio::time::sleep(self.post_delay).await;
		}

		let response = self.client.post_json(url, body).await?;

		if !response.status.is_success() {
			return Err(DispatchError::Status { status: response.status, body: response.body });
		}

		Ok(response)
	}
}

/// explains the status codes discord uses most
fn log_status_hint(status: StatusCode) {
	match status {
		StatusCode::BAD_REQUEST => {
			tracing::warn!("bad request - check embed structure and content length")
		}
		StatusCode::TOO_MANY_REQUESTS => {
			tracing::warn!("rate limited - consider reducing message frequency")
		}
		_ => {}
	}
}
