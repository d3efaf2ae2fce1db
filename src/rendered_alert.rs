//! The discord webhook payload and the structural checks it has to pass before
//! it is sent. Discord rejects the complete message if a single limit is
//! exceeded, so a message that fails validation is dropped instead of being
//! sent.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::{alert::AlertStatus, sanitize::char_len};

/// maximum number of embeds per message
pub const MAX_EMBEDS: usize = 10;
/// maximum number of fields per embed
pub const MAX_FIELDS: usize = 25;
/// maximum length of an embed title in characters
pub const MAX_TITLE_LEN: usize = 256;
/// maximum length of an embed description in characters
pub const MAX_DESCRIPTION_LEN: usize = 4096;
/// maximum length of a field name in characters
pub const MAX_FIELD_NAME_LEN: usize = 256;
/// maximum length of a field value in characters
pub const MAX_FIELD_VALUE_LEN: usize = 1024;
/// default limit for the combined text of all embeds, discord allows 6000
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 5000;

/// embed color for firing alerts
pub const COLOR_RED: u32 = 0xd0_0000;
/// embed color for resolved alerts
pub const COLOR_GREEN: u32 = 0x36_a64f;
/// embed color for everything else
pub const COLOR_GREY: u32 = 0x95_a5a6;

/// Embed color for an alert status
pub fn status_color(status: &AlertStatus) -> u32 {
	match status {
		AlertStatus::Firing => COLOR_RED,
		AlertStatus::Resolved => COLOR_GREEN,
		AlertStatus::Other(_) => COLOR_GREY,
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
/// message posted to a discord webhook
pub struct OutboundMessage {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub content: Option<String>,
	/// overrides the username configured for the webhook
	#[serde(skip_serializing_if = "Option::is_none")]
	pub username: Option<String>,
	/// overrides the avatar configured for the webhook
	#[serde(skip_serializing_if = "Option::is_none")]
	pub avatar_url: Option<String>,
	pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
/// a single rendered alert card
pub struct Embed {
	pub title: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	pub color: u32,
	pub fields: Vec<Field>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub footer: Option<Footer>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
	pub name: String,
	pub value: String,
	pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Footer {
	pub text: String,
}

impl Field {
	/// a field that spans the whole embed width
	pub fn block(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self { name: name.into(), value: value.into(), inline: false }
	}
}

impl Embed {
	pub fn description(&self) -> &str {
		self.description.as_deref().unwrap_or_default()
	}

	/// an embed is worth rendering if it shows at least a title, a description
	/// or a field
	pub fn has_content(&self) -> bool {
		!self.title.is_empty() || !self.description().is_empty() || !self.fields.is_empty()
	}

	/// number of characters discord counts against the message limit
	pub fn text_len(&self) -> usize {
		char_len(&self.title)
			+ char_len(self.description())
			+ self
				.fields
				.iter()
				.map(|field| char_len(field.name.trim()) + char_len(field.value.trim()))
				.sum::<usize>()
	}
}

/// Reasons for refusing to send a message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
	#[error("message has no content or embeds")]
	Empty,
	#[error("message has too many embeds: {0} (max: 10)")]
	TooManyEmbeds(usize),
	#[error("embed {0} has no content")]
	EmptyEmbed(usize),
	#[error("embed {embed} title too long: {len} chars")]
	TitleTooLong { embed: usize, len: usize },
	#[error("embed {embed} description too long: {len} chars")]
	DescriptionTooLong { embed: usize, len: usize },
	#[error("embed {embed} has too many fields: {count}")]
	TooManyFields { embed: usize, count: usize },
	#[error("embed {embed} field {field} has empty name")]
	EmptyFieldName { embed: usize, field: usize },
	#[error("embed {embed} field {field} has empty value")]
	EmptyFieldValue { embed: usize, field: usize },
	#[error("embed {embed} field {field} name too long: {len} chars")]
	FieldNameTooLong { embed: usize, field: usize, len: usize },
	#[error("embed {embed} field {field} value too long: {len} chars")]
	FieldValueTooLong { embed: usize, field: usize, len: usize },
	#[error("message too large: {len} chars (max: {max})")]
	TooLarge { len: usize, max: usize },
}

impl ValidationError {
	/// short label for metrics
	pub fn kind(&self) -> &'static str {
		match self {
			ValidationError::Empty => "empty",
			ValidationError::TooManyEmbeds(_) => "too_many_embeds",
			ValidationError::EmptyEmbed(_) => "empty_embed",
			ValidationError::TitleTooLong { .. } => "title_too_long",
			ValidationError::DescriptionTooLong { .. } => "description_too_long",
			ValidationError::TooManyFields { .. } => "too_many_fields",
			ValidationError::EmptyFieldName { .. } => "empty_field_name",
			ValidationError::EmptyFieldValue { .. } => "empty_field_value",
			ValidationError::FieldNameTooLong { .. } => "field_name_too_long",
			ValidationError::FieldValueTooLong { .. } => "field_value_too_long",
			ValidationError::TooLarge { .. } => "too_large",
		}
	}
}

impl OutboundMessage {
	/// Checks the message against discord's structural limits.
	///
	/// # Arguments
	///
	/// * `max_chars` - upper bound for the combined text of all titles,
	/// descriptions and fields
	pub fn validate(&self, max_chars: usize) -> Result<(), ValidationError> {
		let has_content = self.content.as_deref().map_or(false, |content| !content.is_empty());
		if !has_content && self.embeds.is_empty() {
			return Err(ValidationError::Empty);
		}

		if self.embeds.len() > MAX_EMBEDS {
			return Err(ValidationError::TooManyEmbeds(self.embeds.len()));
		}

		let mut total = 0;

		for (i, embed) in self.embeds.iter().enumerate() {
			validate_embed(i, embed)?;
			total += embed.text_len();
		}

		if total > max_chars {
			return Err(ValidationError::TooLarge { len: total, max: max_chars });
		}

		Ok(())
	}
}

/// checks a single embed, `i` is its position in the message
fn validate_embed(i: usize, embed: &Embed) -> Result<(), ValidationError> {
	if !embed.has_content() {
		return Err(ValidationError::EmptyEmbed(i));
	}

	let len = char_len(&embed.title);
	if len > MAX_TITLE_LEN {
		return Err(ValidationError::TitleTooLong { embed: i, len });
	}

	let len = char_len(embed.description());
	if len > MAX_DESCRIPTION_LEN {
		return Err(ValidationError::DescriptionTooLong { embed: i, len });
	}

	if let Some(url) = &embed.url {
		if let Err(err) = Url::parse(url) {
			tracing::warn!("embed {i} has invalid url {url:?}: {err}");
		}
	}

	if embed.fields.len() > MAX_FIELDS {
		return Err(ValidationError::TooManyFields { embed: i, count: embed.fields.len() });
	}

	for (j, field) in embed.fields.iter().enumerate() {
		let name = field.name.trim();
		let value = field.value.trim();

		if name.is_empty() {
			return Err(ValidationError::EmptyFieldName { embed: i, field: j });
		}
		if value.is_empty() {
			return Err(ValidationError::EmptyFieldValue { embed: i, field: j });
		}

		let len = char_len(name);
		if len > MAX_FIELD_NAME_LEN {
			return Err(ValidationError::FieldNameTooLong { embed: i, field: j, len });
		}

		let len = char_len(value);
		if len > MAX_FIELD_VALUE_LEN {
			return Err(ValidationError::FieldValueTooLong { embed: i, field: j, len });
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn message(embed: Embed) -> OutboundMessage {
		OutboundMessage { embeds: vec![embed], ..Default::default() }
	}

	fn titled(title: String) -> Embed {
		Embed { title, color: COLOR_RED, ..Default::default() }
	}

	#[test]
	fn title_limit_is_inclusive() {
		assert_eq!(message(titled("a".repeat(256))).validate(DEFAULT_MAX_MESSAGE_CHARS), Ok(()));
		assert_eq!(
			message(titled("a".repeat(257))).validate(DEFAULT_MAX_MESSAGE_CHARS),
			Err(ValidationError::TitleTooLong { embed: 0, len: 257 })
		);
	}

	#[test]
	fn empty_message_is_rejected() {
		assert_eq!(OutboundMessage::default().validate(5000), Err(ValidationError::Empty));
	}

	#[test]
	fn content_only_message_is_accepted() {
		let message = OutboundMessage { content: Some("hello".to_owned()), ..Default::default() };

		assert_eq!(message.validate(5000), Ok(()));
	}

	#[test]
	fn empty_embed_is_rejected() {
		assert_eq!(message(Embed::default()).validate(5000), Err(ValidationError::EmptyEmbed(0)));
	}

	#[test]
	fn too_many_embeds() {
		let message = OutboundMessage {
			embeds: vec![titled("alert".to_owned()); MAX_EMBEDS + 1],
			..Default::default()
		};

		assert_eq!(message.validate(5000), Err(ValidationError::TooManyEmbeds(11)));
	}

	#[test]
	fn description_limit() {
		let mut embed = titled("alert".to_owned());
		embed.description = Some("d".repeat(4097));

		assert_eq!(
			message(embed).validate(10_000),
			Err(ValidationError::DescriptionTooLong { embed: 0, len: 4097 })
		);
	}

	#[test]
	fn field_limits() {
		let mut embed = titled("alert".to_owned());
		embed.fields = vec![Field::block("Details", "x"); 26];
		assert_eq!(
			message(embed.clone()).validate(5000),
			Err(ValidationError::TooManyFields { embed: 0, count: 26 })
		);

		embed.fields = vec![Field::block("Details", "   ")];
		assert_eq!(
			message(embed.clone()).validate(5000),
			Err(ValidationError::EmptyFieldValue { embed: 0, field: 0 })
		);

		embed.fields = vec![Field::block(" ", "value")];
		assert_eq!(
			message(embed.clone()).validate(5000),
			Err(ValidationError::EmptyFieldName { embed: 0, field: 0 })
		);

		embed.fields = vec![Field::block("Details", "v".repeat(1025))];
		assert_eq!(
			message(embed.clone()).validate(5000),
			Err(ValidationError::FieldValueTooLong { embed: 0, field: 0, len: 1025 })
		);

		embed.fields = vec![Field::block("n".repeat(257), "value")];
		assert_eq!(
			message(embed).validate(5000),
			Err(ValidationError::FieldNameTooLong { embed: 0, field: 0, len: 257 })
		);
	}

	#[test]
	fn total_size_is_limited() {
		let mut embed = titled("t".repeat(200));
		embed.description = Some("d".repeat(4000));
		embed.fields = vec![Field::block("Details", "v".repeat(900))];

		assert_eq!(
			message(embed.clone()).validate(5000),
			Err(ValidationError::TooLarge { len: 5107, max: 5000 })
		);
		assert_eq!(message(embed).validate(6000), Ok(()));
	}

	#[test]
	fn invalid_url_is_not_fatal() {
		let mut embed = titled("alert".to_owned());
		embed.url = Some("not a url".to_owned());

		assert_eq!(message(embed).validate(5000), Ok(()));
	}

	#[test]
	fn serializes_discord_schema() {
		let message = OutboundMessage {
			username: Some("alertmanager".to_owned()),
			embeds: vec![Embed {
				title: "Disk full".to_owned(),
				color: COLOR_GREEN,
				fields: vec![Field::block("Details", "• alertname: DiskSpace")],
				footer: Some(Footer { text: "alertmanager".to_owned() }),
				..Default::default()
			}],
			..Default::default()
		};

		let json = serde_json::to_value(&message).unwrap();

		assert_eq!(
			json,
			serde_json::json!({
				"username": "alertmanager",
				"embeds": [{
					"title": "Disk full",
					"color": 0x36a64f,
					"fields": [{ "name": "Details", "value": "• alertname: DiskSpace", "inline": false }],
					"footer": { "text": "alertmanager" }
				}]
			})
		);
	}
}
