use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{body::Bytes, http::StatusCode, routing::post, Extension, Router};

use crate::relay::Relay;

/// Receives alertmanager webhook requests. Always answers with `200 OK`,
/// delivery problems are only logged.
async fn alertmanager_receiver(Extension(relay): Extension<Arc<Relay>>, body: Bytes) -> StatusCode {
	tracing::info!("received alertmanager request ({} bytes)", body.len());

	relay.handle_body(&body).await;

	StatusCode::OK
}

/// router serving the webhook endpoint
pub fn router(relay: Arc<Relay>) -> Router {
	Router::new().route("/", post(alertmanager_receiver)).layer(Extension(relay))
}

pub async fn run_alertmanager_receiver(addr: SocketAddr, relay: Arc<Relay>) -> Result<()> {
	tracing::info!("listening on: {addr}");

	axum::Server::try_bind(&addr)
		.context(format!("failed to bind {addr}"))?
		.serve(router(relay).into_make_service())
		.await
		.context("alertmanager endpoint crashed")?;

	Ok(())
}
