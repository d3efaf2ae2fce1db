use anyhow::Result;
use tracing_subscriber::{
	filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
	EnvFilter,
};

/// target of the request and response payload logs
pub const PAYLOAD_TARGET: &str = "alertmanager_discord::payload";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
	pub level: tracing::Level,
	/// log request and response payloads regardless of `level`
	pub verbose: bool,
}

/// Builds the log filter for `settings`
pub fn filter(settings: &LogSettings) -> Result<EnvFilter> {
	let mut filter = EnvFilter::default()
		.add_directive(LevelFilter::from_level(settings.level).into())
		.add_directive("hyper=warn".parse()?)
		.add_directive("reqwest=warn".parse()?);

	if settings.verbose {
		filter = filter.add_directive(format!("{PAYLOAD_TARGET}=debug").parse()?);
	}

	Ok(filter)
}

pub fn setup_logging(settings: &LogSettings) -> Result<()> {
	let fmt_layer = fmt::layer();

	let filter_layer = filter(settings)?;

	let registry = tracing_subscriber::registry().with(filter_layer).with(fmt_layer);

	#[cfg(feature = "console")]
	let registry = registry.with(console_subscriber::spawn());

	registry.try_init()?;

	Ok(())
}
