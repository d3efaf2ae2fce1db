//! validation of the discord webhook urls we send messages to
use thiserror::Error;
use url::Url;

/// hosts discord serves webhooks from
const DISCORD_HOSTS: [&str; 2] = ["discord.com", "discordapp.com"];

/// Error returned if a destination url can't be used at all
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookUrlError {
	#[error("webhook url is empty")]
	Empty,
	#[error("webhook url {0:?} doesn't seem to be a valid url: {1}")]
	Invalid(String, url::ParseError),
	#[error("webhook url {0:?} doesn't seem to be a discord webhook")]
	NotDiscord(String),
}

/// Parses a destination url. Only empty or unparsable urls are rejected,
/// see [looks_like_discord_webhook] for the stricter check.
pub fn parse(url: &str) -> Result<Url, WebhookUrlError> {
	let url = url.trim();

	if url.is_empty() {
		return Err(WebhookUrlError::Empty);
	}

	Url::parse(url).map_err(|err| WebhookUrlError::Invalid(url.to_owned(), err))
}

/// Checks that `url` has the shape of a discord webhook:
/// `https://discord(app).com/api/webhooks/{id}/{token}` where `id` has 17 to
/// 19 digits and `token` consists of ascii alphanumerics, `_` and `-`.
pub fn looks_like_discord_webhook(url: &Url) -> bool {
	if url.scheme() != "https" {
		return false;
	}

	let host = url.host_str().unwrap_or_default();
	if !DISCORD_HOSTS.contains(&host) {
		return false;
	}

	let segments: Vec<&str> = match url.path_segments() {
		Some(segments) => segments.collect(),
		None => return false,
	};

	match segments.as_slice() {
		["api", "webhooks", id, token, ..] => is_webhook_id(id) && is_webhook_token(token),
		_ => false,
	}
}

fn is_webhook_id(id: &str) -> bool {
	(17..=19).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_digit())
}

fn is_webhook_token(token: &str) -> bool {
	!token.is_empty() && token.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Parses `url` and checks it with [looks_like_discord_webhook]
pub fn parse_discord(url: &str) -> Result<Url, WebhookUrlError> {
	let parsed = parse(url)?;

	if !looks_like_discord_webhook(&parsed) {
		return Err(WebhookUrlError::NotDiscord(parsed.to_string()));
	}

	Ok(parsed)
}

/// Parses a comma separated list of additional destinations. Blank entries are
/// ignored. Returns the usable urls and the errors of the entries that failed
/// [parse_discord].
pub fn parse_list(list: &str) -> (Vec<Url>, Vec<WebhookUrlError>) {
	let (urls, errors): (Vec<_>, Vec<_>) = list
		.split(',')
		.map(str::trim)
		.filter(|url| !url.is_empty())
		.map(parse_discord)
		.partition(Result::is_ok);

	(urls.into_iter().flatten().collect(), errors.into_iter().filter_map(Result::err).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	const VALID: &str = "https://discord.com/api/webhooks/123456789012345678/abc_DEF-123";

	#[test]
	fn accepts_discord_webhooks() {
		for url in [
			VALID,
			"https://discordapp.com/api/webhooks/12345678901234567/token",
			"https://discord.com/api/webhooks/1234567890123456789/token/github",
		] {
			assert!(looks_like_discord_webhook(&parse(url).unwrap()), "{url}");
		}
	}

	#[test]
	fn rejects_other_urls() {
		for url in [
			"http://discord.com/api/webhooks/123456789012345678/token",
			"https://example.com/api/webhooks/123456789012345678/token",
			"https://discord.com/api/webhooks/1234/token",
			"https://discord.com/api/webhooks/12345678901234567890/token",
			"https://discord.com/api/webhooks/123456789012345678/tok!en",
			"https://discord.com/api/webhooks/123456789012345678",
			"https://discord.com/webhooks/123456789012345678/token",
		] {
			assert!(!looks_like_discord_webhook(&parse(url).unwrap()), "{url}");
		}
	}

	#[test]
	fn empty_and_invalid_urls() {
		assert_eq!(parse("  "), Err(WebhookUrlError::Empty));
		assert!(matches!(parse("not a url"), Err(WebhookUrlError::Invalid(..))));
	}

	#[test]
	fn additional_urls_are_filtered() {
		let list = format!(" {VALID} , ,https://example.com/hook,nonsense,");

		let (urls, errors) = parse_list(&list);

		assert_eq!(urls, [Url::parse(VALID).unwrap()]);
		assert_eq!(errors.len(), 2);
		assert!(matches!(errors[0], WebhookUrlError::NotDiscord(_)));
		assert!(matches!(errors[1], WebhookUrlError::Invalid(..)));
		assert_eq!(parse_list(""), (vec![], vec![]));
	}
}
