//! Here we expose prometheus metrics about the relay
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
	body::Body,
	http::{header::CONTENT_TYPE, Response, StatusCode},
	routing::get,
	Router,
};
use prometheus::{Encoder, TextEncoder};

async fn metrics_handler() -> Response<Body> {
	let mut buffer = vec![];
	let encoder = TextEncoder::new();
	let metric_families = prometheus::gather();

	let response = match encoder.encode(&metric_families, &mut buffer) {
		Ok(()) => Response::builder()
			.status(StatusCode::OK)
			.header(CONTENT_TYPE, encoder.format_type())
			.body(Body::from(buffer)),
		Err(err) => {
			tracing::error!("failed to encode metrics: {err}");
			Response::builder().status(StatusCode::INTERNAL_SERVER_ERROR).body(Body::empty())
		}
	};

	#[allow(clippy::expect_used)]
	response.expect("can't construct a response from static parts")
}

pub async fn run_telemetry_endpoint(addr: SocketAddr) -> Result<()> {
	tracing::info!("serving metrics on: {addr}/metrics");

	let app = Router::new().route("/metrics", get(metrics_handler));
	axum::Server::try_bind(&addr)
		.context(format!("failed to bind {addr}"))?
		.serve(app.into_make_service())
		.await
		.context("telemetry endpoint crashed")?;

	Ok(())
}
