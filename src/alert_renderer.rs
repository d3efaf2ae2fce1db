//! Renders alerts into discord embeds.
//!
//! Alerts are received from [relay](crate::relay), rendered messages are
//! handed to the [Dispatcher](crate::dispatcher::Dispatcher).

use chrono::Utc;
use url::Url;

use crate::{
	alert::{Alert, AlertGroupNotification, AlertStatus, KeyValues, ALERT_NAME_LABEL},
	rendered_alert::{status_color, Embed, Field, Footer, OutboundMessage, COLOR_GREY},
	sanitize::{self, char_len, clean, truncate, EMPTY_LABEL_VALUES},
};

/// title used when an alert has neither a summary nor a name
pub const DEFAULT_TITLE: &str = "Alert Notification";
/// group name used when nothing in the notification names the alerts
pub const DEFAULT_GROUP_NAME: &str = "Multiple Alerts";
/// last line of the label list if labels were left out
pub const MORE_LABELS_MARKER: &str = "• ...and more";

/// max length of an alert title, leaves some margin to discord's 256
const MAX_ALERT_TITLE_LEN: usize = 250;
/// max length of an alert description
const MAX_ALERT_DESCRIPTION_LEN: usize = 1000;
/// max length of the message and description fields
const MAX_ANNOTATION_FIELD_LEN: usize = 800;
/// number of labels shown in the details field
const MAX_DETAIL_LABELS: usize = 3;
/// label values longer than this are shortened to [SHORT_LABEL_VALUE_LEN]
const MAX_LABEL_VALUE_LEN: usize = 25;
const SHORT_LABEL_VALUE_LEN: usize = 22;
/// description annotations this short don't get their own field
const MIN_DESCRIPTION_FIELD_LEN: usize = 10;
/// titles and descriptions this short make an embed not worth sending
const MIN_MEANINGFUL_LEN: usize = 3;
/// max length of the group header title and description
const MAX_HEADER_TITLE_LEN: usize = 150;
const MAX_HEADER_DESCRIPTION_LEN: usize = 200;
/// common description annotations longer than this are cut for the group name
const MAX_GROUP_DESCRIPTION_LEN: usize = 50;

/// text sent when the relay receives alerts straight from prometheus
pub const MISCONFIGURED_WARNING: &str = "This program is suppose to be fed by alert manager.\n\
	It is not a replacement for alert manager, it is a \n\
	webhook target for it. Please read the README.md  \n\
	for guidance on how to configure it for alertmanager\n\
	or https://prometheus.io/docs/alerting/latest/configuration/#webhook_config";

/// Renders the labels of an alert as a short bullet list.
///
/// At most three labels are listed, `alertname` always first. Placeholder
/// values are skipped and long values are shortened. Returns an empty string
/// if there is nothing worth showing.
pub fn format_labels(labels: &KeyValues) -> String {
	let mut lines = Vec::with_capacity(MAX_DETAIL_LABELS + 1);

	for (name, value) in labels.sorted_pairs() {
		if lines.len() >= MAX_DETAIL_LABELS {
			lines.push(MORE_LABELS_MARKER.to_owned());
			break;
		}

		let value = value.trim();
		if value.is_empty() || EMPTY_LABEL_VALUES.contains(&value) {
			continue;
		}

		let value = if char_len(value) > MAX_LABEL_VALUE_LEN {
			let mut short: String = value.chars().take(SHORT_LABEL_VALUE_LEN).collect();
			short.push_str(sanitize::ELLIPSIS);
			short
		} else {
			value.to_owned()
		};

		lines.push(format!("• {name}: {value}"));
	}

	let details = lines.join("\n");
	if details == MORE_LABELS_MARKER {
		return String::new();
	}

	details
}

/// Title of an alert embed: summary or alert name, followed by the severity.
pub fn alert_title(alert: &Alert) -> String {
	let mut title = match alert.annotations.non_empty("summary") {
		Some(summary) => summary.trim().to_owned(),
		None => match alert.labels.non_empty(ALERT_NAME_LABEL) {
			Some(name) => name.trim().to_owned(),
			None => DEFAULT_TITLE.to_owned(),
		},
	};

	if let Some(severity) = alert.labels.non_empty("severity") {
		title.push_str(&format!(" [{}]", severity.trim()));
	}

	let title = title.replace("(instance )", "").replace("(instance)", "");
	let title = truncate(title.trim(), MAX_ALERT_TITLE_LEN);

	if title.is_empty() {
		return DEFAULT_TITLE.to_owned();
	}

	title
}

/// Description of an alert embed taken from the summary or description
/// annotation. `None` if both are missing or only contain placeholders.
pub fn alert_description(alert: &Alert) -> Option<String> {
	let description = alert
		.annotations
		.non_empty("summary")
		.or_else(|| alert.annotations.non_empty("description"))?;

	let description = clean(description);
	if description.is_empty() {
		return None;
	}

	Some(truncate(&description, MAX_ALERT_DESCRIPTION_LEN))
}

/// Status icon of an alert group
pub fn status_icon(data: &AlertGroupNotification) -> &'static str {
	if !data.status.is_firing() {
		return "💚";
	}

	match data.common_labels.get("severity") {
		Some("critical") => "🔥",
		Some("warning") => "⚠️",
		_ => "ℹ️",
	}
}

/// Human readable name of an alert group prefixed with its status icon
pub fn group_display_name(data: &AlertGroupNotification) -> String {
	format!("{} {}", status_icon(data), group_name(data))
}

/// picks the first annotation or label that names the alert group
fn group_name(data: &AlertGroupNotification) -> String {
	let common = &data.common_annotations;

	if let Some(summary) = common.non_empty("summary") {
		return summary.to_owned();
	}
	if let Some(message) = common.non_empty("message") {
		return message.to_owned();
	}
	if let Some(description) = common.non_empty("description") {
		if char_len(description) > MAX_GROUP_DESCRIPTION_LEN {
			let first_line = description.lines().next().unwrap_or_default();
			return truncate(first_line, MAX_GROUP_DESCRIPTION_LEN);
		}
		return description.to_owned();
	}
	if let Some(name) = data.common_labels.non_empty(ALERT_NAME_LABEL) {
		return name.to_owned();
	}

	if let Some(first) = data.alerts.first() {
		if let Some(summary) = first.annotations.non_empty("summary") {
			return summary.to_owned();
		}
		if let Some(name) = first.labels.non_empty(ALERT_NAME_LABEL) {
			return name.to_owned();
		}
	}

	DEFAULT_GROUP_NAME.to_owned()
}

/// Display overrides applied to every rendered message
#[derive(Debug, Clone, Default)]
pub struct Overrides {
	/// username of the webhook, also used as embed footer
	pub username: Option<String>,
	/// avatar of the webhook
	pub avatar_url: Option<String>,
}

/// Alert renderer
#[derive(Debug, Clone)]
pub struct AlertRenderer {
	overrides: Overrides,
}

impl AlertRenderer {
	/// Return new renderer
	pub fn new(overrides: Overrides) -> Self {
		Self { overrides }
	}

	/// Renders a single alert into a message with one embed.
	///
	/// Returns `None` if the embed wouldn't carry enough information to be
	/// worth sending.
	///
	/// # Arguments
	///
	/// * `alert` - the alert to render
	///
	/// * `status` - status of the group the alert was sorted into, selects the
	/// embed color
	pub fn render_alert(&self, alert: &Alert, status: &AlertStatus) -> Option<OutboundMessage> {
		let mut embed = Embed {
			title: alert_title(alert),
			description: alert_description(alert),
			color: status_color(status),
			..Default::default()
		};

		let summary = alert.annotations.get("summary").unwrap_or_default();

		if let Some(message) = alert.annotations.non_empty("message") {
			if message.trim() != summary {
				if let Some(message) = sanitize::field_value(message) {
					embed.fields.push(Field::block(
						"Message",
						truncate(&message, MAX_ANNOTATION_FIELD_LEN),
					));
				}
			}
		}

		if let Some(description) = alert.annotations.non_empty("description") {
			if description.trim() != embed.description() {
				if let Some(description) = sanitize::field_value(description) {
					if char_len(&description) > MIN_DESCRIPTION_FIELD_LEN {
						embed.fields.push(Field::block(
							"Description",
							truncate(&description, MAX_ANNOTATION_FIELD_LEN),
						));
					}
				}
			}
		}

		let details = format_labels(&alert.labels);
		if !details.is_empty() {
			embed.fields.push(Field::block("Details", details));
		}

		self.add_footer(&mut embed);

		if !is_meaningful(&embed) {
			tracing::debug!(
				"skipping alert {} without meaningful content: {:?}",
				alert.fingerprint,
				embed.title
			);
			return None;
		}

		Some(self.message(vec![embed]))
	}

	/// Renders the optional header that precedes the alerts of a status group.
	///
	/// # Arguments
	///
	/// * `data` - the received notification
	///
	/// * `status` - status of the group, selects the embed color
	pub fn render_group_header(
		&self,
		data: &AlertGroupNotification,
		status: &AlertStatus,
	) -> OutboundMessage {
		let name = truncate(&group_display_name(data), MAX_HEADER_TITLE_LEN);
		let title =
			truncate(&format!("[{}] {name}", status.as_str().to_uppercase()), MAX_HEADER_TITLE_LEN);

		let description = data
			.common_annotations
			.non_empty("summary")
			.or_else(|| data.alerts.first().and_then(|alert| alert.annotations.non_empty("summary")))
			.map(|summary| truncate(summary, MAX_HEADER_DESCRIPTION_LEN));

		let url = match Url::parse(&data.external_url) {
			Ok(url) => Some(url.to_string()),
			Err(err) => {
				if !data.external_url.is_empty() {
					tracing::warn!("invalid external url {:?}, skipping: {err}", data.external_url);
				}
				None
			}
		};

		let mut embed =
			Embed { title, description, url, color: status_color(status), ..Default::default() };
		self.add_footer(&mut embed);

		self.message(vec![embed])
	}

	/// The warning sent when raw prometheus alerts are posted to the relay.
	/// Display overrides are not applied.
	pub fn misconfiguration_warning(&self) -> OutboundMessage {
		OutboundMessage {
			embeds: vec![Embed {
				title: "misconfigured program".to_owned(),
				description: Some(MISCONFIGURED_WARNING.to_owned()),
				color: COLOR_GREY,
				..Default::default()
			}],
			..Default::default()
		}
	}

	/// footer and timestamp are only shown if a username override is set
	fn add_footer(&self, embed: &mut Embed) {
		if let Some(username) = &self.overrides.username {
			embed.footer = Some(Footer { text: username.clone() });
			embed.timestamp = Some(Utc::now());
		}
	}

	fn message(&self, embeds: Vec<Embed>) -> OutboundMessage {
		OutboundMessage {
			content: None,
			username: self.overrides.username.clone(),
			avatar_url: self.overrides.avatar_url.clone(),
			embeds,
		}
	}
}

/// an embed needs a real title and either a description or a field
fn is_meaningful(embed: &Embed) -> bool {
	char_len(embed.title.trim()) > MIN_MEANINGFUL_LEN
		&& (char_len(embed.description().trim()) > MIN_MEANINGFUL_LEN || !embed.fields.is_empty())
}
