//! http client used to post messages to webhooks, records prometheus metrics
//! for every request
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use prometheus::{HistogramVec, IntCounterVec};
use reqwest::{header::CONTENT_TYPE, StatusCode};
use url::Url;

/// timeout of a single webhook request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
/// prometheus meters for the webhook http client
struct Metrics {
	/// total number of http requests
	http_requests: IntCounterVec,
	/// total number of failed http requests
	http_requests_failed: IntCounterVec,
	/// time spent by http requests
	http_request_duration: HistogramVec,
}

impl Metrics {
	/// construct and register prometheus meters
	pub fn new() -> Result<Self, prometheus::Error> {
		use prometheus::{
			exponential_buckets, histogram_opts, opts, register_histogram_vec,
			register_int_counter_vec,
		};

		let http_requests = register_int_counter_vec!(
			opts!("requests_total", "total number of http requests")
				.namespace("alertmanager_discord")
				.subsystem("webhook_http_client"),
			&["host"]
		)?;

		let http_requests_failed = register_int_counter_vec!(
			opts!("requests_failed", "number of failed http requests")
				.namespace("alertmanager_discord")
				.subsystem("webhook_http_client"),
			&["host", "status_code"]
		)?;

		let http_request_duration = register_histogram_vec!(
			histogram_opts!(
				"request_duration_seconds",
				"total time of a http request in seconds",
				exponential_buckets(0.01, 2., 12)?
			)
			.subsystem("webhook_http_client")
			.namespace("alertmanager_discord"),
			&["host"]
		)?;

		Ok(Self { http_requests, http_requests_failed, http_request_duration })
	}
}

#[allow(clippy::expect_used)]
static METRICS: Lazy<Metrics> =
	Lazy::new(|| Metrics::new().expect("failed to register webhook http client meters"));

/// Response of a webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
	pub status: StatusCode,
	pub body: String,
}

/// Posts json bodies to webhook urls. Doesn't retry, failed requests are
/// handled by the caller.
#[async_trait]
pub trait WebhookClient: Send + Sync {
	async fn post_json(&self, url: &Url, body: Bytes) -> Result<WebhookResponse, reqwest::Error>;
}

#[derive(Debug, Clone)]
/// [WebhookClient] backed by reqwest
pub struct Client {
	/// http client
	client: reqwest::Client,
}

impl Client {
	/// construct http client
	pub fn new() -> Result<Self> {
		Ok(Self {
			client: reqwest::Client::builder()
				.timeout(REQUEST_TIMEOUT)
				.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
				.build()
				.context("failed to build reqwest client")?,
		})
	}
}

#[async_trait]
impl WebhookClient for Client {
	async fn post_json(&self, url: &Url, body: Bytes) -> Result<WebhookResponse, reqwest::Error> {
		let host = url.host_str().unwrap_or_default();

		let _timer = METRICS.http_request_duration.with_label_values(&[host]).start_timer();
		METRICS.http_requests.with_label_values(&[host]).inc();

		let response = match self
			.client
			.post(url.clone())
			.header(CONTENT_TYPE, "application/json")
			.body(body)
			.send()
			.await
		{
			Ok(response) => response,
			Err(err) => {
				METRICS.http_requests_failed.with_label_values(&[host, ""]).inc();
				return Err(err);
			}
		};

		let status = response.status();
		if !status.is_success() {
			METRICS.http_requests_failed.with_label_values(&[host, status.as_str()]).inc();
		}

		let body = response.text().await?;

		Ok(WebhookResponse { status, body })
	}
}
