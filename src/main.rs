use std::sync::Arc;

use alertmanager_discord::{
	alert_renderer::AlertRenderer, alertmanager_webhook_receiver, dispatcher::Dispatcher,
	http_client, log, relay::Relay, settings::Settings, telemetry_endpoint,
};
use anyhow::{Context, Result};

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let settings = Settings::load().context("failed to load config and command line arguments")?;

	log::setup_logging(&settings.log).context("could not setup logging")?;
	settings.log_warnings();

	let client = http_client::Client::new().context("failed to construct webhook client")?;

	let dispatcher = Dispatcher::new(
		Arc::new(client),
		settings.webhook_url.clone(),
		settings.additional_webhook_urls.clone(),
		settings.post_delay,
		settings.max_message_chars,
	);
	tracing::info!("sending alerts to {} webhook(s)", dispatcher.destinations().count());

	let relay = Arc::new(Relay::new(
		AlertRenderer::new(settings.overrides()),
		dispatcher,
		settings.message_delay,
		settings.group_header,
	));

	if let Some(addr) = settings.telemetry_address {
		tokio::spawn(async move {
			#[allow(clippy::expect_used)]
			telemetry_endpoint::run_telemetry_endpoint(addr)
				.await
				.expect("telemetry endpoint failed to start or crashed");
		});
	}

	alertmanager_webhook_receiver::run_alertmanager_receiver(settings.listen_address, relay).await
}
