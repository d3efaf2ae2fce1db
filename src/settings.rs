//! Command line flags, environment variables and the optional config file,
//! merged into one immutable [Settings] value at startup.
//!
//! Precedence: flag, environment variable, config file, default.
use std::{
	net::{AddrParseError, SocketAddr},
	str::FromStr,
	time::Duration,
};

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use config::Config;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use thiserror::Error;
use url::Url;

use crate::{
	alert_renderer::Overrides,
	log::LogSettings,
	rendered_alert::DEFAULT_MAX_MESSAGE_CHARS,
	webhook_url::{self, WebhookUrlError},
};

/// address the alertmanager receiver listens on if nothing else is configured
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:9099";

/// Configuration problems that prevent the relay from starting
#[derive(Error, Debug)]
pub enum SettingsError {
	#[error("environment variable 'DISCORD_WEBHOOK' or CLI parameter 'webhook.url' not found")]
	MissingWebhookUrl,
	#[error("the discord webhook url doesn't seem to be a valid url")]
	InvalidWebhookUrl(#[source] WebhookUrlError),
	#[error("environment variable 'DISCORD_USERNAME' or CLI parameter 'username' not found")]
	MissingUsername,
	#[error("invalid listen address {0:?}")]
	InvalidListenAddress(String, #[source] AddrParseError),
	#[error("invalid telemetry address {0:?}")]
	InvalidTelemetryAddress(String, #[source] AddrParseError),
	#[error("invalid log level {0:?}")]
	InvalidLogLevel(String),
}

/// settings as they come out of the config layers, before validation
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
struct RawSettings {
	#[serde(default)]
	webhook_url: String,
	#[serde(default)]
	additional_webhook_urls: String,
	listen_address: String,
	#[serde(default)]
	username: String,
	#[serde(default)]
	avatar_url: String,
	#[serde(default)]
	verbose: String,
	#[serde(default)]
	log: Option<String>,
	#[serde(default)]
	telemetry_address: Option<String>,
	group_header: bool,
	#[serde_as(as = "DurationSeconds<f64>")]
	post_delay: Duration,
	#[serde_as(as = "DurationSeconds<f64>")]
	message_delay: Duration,
	max_message_chars: usize,
}

#[derive(Debug, Clone)]
pub struct Settings {
	/// every message is sent here first
	pub webhook_url: Url,
	/// messages are also sent to these webhooks
	pub additional_webhook_urls: Vec<Url>,
	/// additional webhooks that were left out
	pub skipped_webhook_urls: Vec<WebhookUrlError>,
	/// address of the alertmanager webhook endpoint
	pub listen_address: SocketAddr,
	pub username: String,
	pub avatar_url: Option<String>,
	pub log: LogSettings,
	/// address of the prometheus metrics endpoint, disabled if `None`
	pub telemetry_address: Option<SocketAddr>,
	/// send a header message before the alerts of each status group
	pub group_header: bool,
	/// delay before every webhook request
	pub post_delay: Duration,
	/// delay after every alert message
	pub message_delay: Duration,
	/// upper bound for the combined text of a message
	pub max_message_chars: usize,
}

impl Settings {
	/// Loads settings from the process arguments, environment and config file
	pub fn load() -> Result<Self> {
		Self::from_matches(&Self::command().get_matches())
	}

	/// command line definition, every flag falls back to an environment variable
	pub fn command() -> Command<'static> {
		Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.author(clap::crate_authors!())
			.args(&[
				Arg::new("config")
					.help("path of an optional config file")
					.takes_value(true)
					.short('c')
					.long("config")
					.env("RELAY_CONFIG"),
				Arg::new("webhook.url")
					.help("Discord WebHook URL.")
					.takes_value(true)
					.long("webhook.url")
					.env("DISCORD_WEBHOOK"),
				Arg::new("additionalWebhook.urls")
					.help("Additional Discord WebHook URLs.")
					.takes_value(true)
					.long("additionalWebhook.urls")
					.env("ADDITIONAL_DISCORD_WEBHOOKS"),
				Arg::new("listen.address")
					.help("Address:Port to listen on.")
					.takes_value(true)
					.long("listen.address")
					.env("LISTEN_ADDRESS"),
				Arg::new("username")
					.help("Overrides the predefined username of the webhook.")
					.takes_value(true)
					.long("username")
					.env("DISCORD_USERNAME"),
				Arg::new("avatar.url")
					.help("Overrides the predefined avatar of the webhook.")
					.takes_value(true)
					.long("avatar.url")
					.env("DISCORD_AVATAR_URL"),
				Arg::new("verbose")
					.help("Verbose mode, enabled by ON or true")
					.takes_value(true)
					.long("verbose")
					.env("VERBOSE"),
				Arg::new("level")
					.help("log level")
					.possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log")
					.env("RELAY_LOG"),
				Arg::new("telemetry.address")
					.help("Address:Port of the prometheus metrics endpoint")
					.takes_value(true)
					.long("telemetry.address")
					.env("TELEMETRY_ADDRESS"),
				Arg::new("group-header")
					.help("Send a header message before the alerts of each status group")
					.takes_value(true)
					.long("group-header")
					.env("GROUP_HEADER"),
			])
	}

	/// Merges parsed command line arguments with the config file and defaults
	pub fn from_matches(opts: &ArgMatches) -> Result<Self> {
		let mut builder = Config::builder()
			.set_default("listen_address", DEFAULT_LISTEN_ADDRESS)?
			.set_default("group_header", false)?
			.set_default("post_delay", 0.1)?
			.set_default("message_delay", 0.2)?
			.set_default("max_message_chars", DEFAULT_MAX_MESSAGE_CHARS as i64)?;

		if let Some(config_path) = opts.value_of("config") {
			builder = builder.add_source(config::File::with_name(config_path));
		}

		let overrides = [
			("webhook_url", "webhook.url"),
			("additional_webhook_urls", "additionalWebhook.urls"),
			("listen_address", "listen.address"),
			("username", "username"),
			("avatar_url", "avatar.url"),
			("verbose", "verbose"),
			("log", "level"),
			("telemetry_address", "telemetry.address"),
			("group_header", "group-header"),
		];

		// blank values count as unset
		for (key, arg) in overrides {
			let value = opts.value_of(arg).filter(|value| !value.trim().is_empty());
			builder = builder.set_override_option(key, value)?;
		}

		let raw: RawSettings = builder
			.build()
			.context("can't load config")?
			.try_deserialize()
			.context("can't load config")?;

		Ok(Self::validate(raw)?)
	}

	/// display overrides for the renderer
	pub fn overrides(&self) -> Overrides {
		Overrides { username: Some(self.username.clone()), avatar_url: self.avatar_url.clone() }
	}

	/// Logs configuration problems that aren't fatal. Called once logging is
	/// set up.
	pub fn log_warnings(&self) {
		if !webhook_url::looks_like_discord_webhook(&self.webhook_url) {
			tracing::warn!("the discord webhook url doesn't seem to be valid");
		}

		for err in &self.skipped_webhook_urls {
			tracing::warn!("skipping additional webhook: {err}");
		}
	}

	/// checks the merged settings, errors are fatal
	fn validate(raw: RawSettings) -> Result<Self, SettingsError> {
		let webhook_url = match webhook_url::parse(&raw.webhook_url) {
			Ok(url) => url,
			Err(WebhookUrlError::Empty) => return Err(SettingsError::MissingWebhookUrl),
			Err(err) => return Err(SettingsError::InvalidWebhookUrl(err)),
		};

		let (additional_webhook_urls, skipped_webhook_urls) =
			webhook_url::parse_list(&raw.additional_webhook_urls);

		let username = raw.username.trim();
		if username.is_empty() {
			return Err(SettingsError::MissingUsername);
		}

		let listen_address = SocketAddr::from_str(raw.listen_address.trim())
			.map_err(|err| SettingsError::InvalidListenAddress(raw.listen_address.clone(), err))?;

		let telemetry_address = match raw.telemetry_address.as_deref().map(str::trim) {
			Some(addr) if !addr.is_empty() => Some(
				SocketAddr::from_str(addr)
					.map_err(|err| SettingsError::InvalidTelemetryAddress(addr.to_owned(), err))?,
			),
			_ => None,
		};

		let verbose = matches!(raw.verbose.trim(), "ON" | "true");

		let level = match raw.log.as_deref() {
			Some(level) => level,
			None if verbose => "debug",
			None => "info",
		};
		let level = tracing::Level::from_str(level)
			.map_err(|_| SettingsError::InvalidLogLevel(level.to_owned()))?;

		let avatar_url = Some(raw.avatar_url.trim()).filter(|url| !url.is_empty()).map(str::to_owned);

		Ok(Self {
			webhook_url,
			additional_webhook_urls,
			skipped_webhook_urls,
			listen_address,
			username: username.to_owned(),
			avatar_url,
			log: LogSettings { level, verbose },
			telemetry_address,
			group_header: raw.group_header,
			post_delay: raw.post_delay,
			message_delay: raw.message_delay,
			max_message_chars: raw.max_message_chars,
		})
	}
}
