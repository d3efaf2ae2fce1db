//! data structures for deserializing incoming alerts
use std::{cmp::Ordering, collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// label that identifies the alerting rule and is always rendered first
pub const ALERT_NAME_LABEL: &str = "alertname";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
/// alert group sent by the alertmanager webhook integration
#[allow(clippy::missing_docs_in_private_items)]
pub struct AlertGroupNotification {
	pub version: String,
	pub group_key: String,

	pub receiver: String,
	pub status: AlertStatus,
	pub alerts: Vec<Alert>,
	pub group_labels: KeyValues,
	pub common_labels: KeyValues,
	pub common_annotations: KeyValues,
	#[serde(rename = "externalURL")]
	pub external_url: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::missing_docs_in_private_items)]
pub struct Alert {
	pub status: AlertStatus,
	pub labels: KeyValues,
	pub annotations: KeyValues,
	pub starts_at: Option<DateTime<Utc>>,
	pub ends_at: Option<DateTime<Utc>>,
	#[serde(rename = "generatorURL")]
	pub generator_url: String,
	pub fingerprint: String,
}

/// status of an alert or an alert group
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum AlertStatus {
	Firing,
	Resolved,
	/// any status alertmanager may add in the future
	Other(String),
}

impl AlertStatus {
	pub fn as_str(&self) -> &str {
		match self {
			AlertStatus::Firing => "firing",
			AlertStatus::Resolved => "resolved",
			AlertStatus::Other(status) => status.as_str(),
		}
	}

	pub fn is_firing(&self) -> bool {
		matches!(self, AlertStatus::Firing)
	}
}

impl Default for AlertStatus {
	fn default() -> Self {
		AlertStatus::Other(String::new())
	}
}

impl From<String> for AlertStatus {
	fn from(status: String) -> Self {
		match status.as_str() {
			"firing" => AlertStatus::Firing,
			"resolved" => AlertStatus::Resolved,
			_ => AlertStatus::Other(status),
		}
	}
}

impl From<&str> for AlertStatus {
	fn from(status: &str) -> Self {
		AlertStatus::from(status.to_owned())
	}
}

impl From<AlertStatus> for String {
	fn from(status: AlertStatus) -> Self {
		status.as_str().to_owned()
	}
}

impl fmt::Display for AlertStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Labels or annotations of an alert. Keys are unique.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct KeyValues(HashMap<String, String>);

impl KeyValues {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the value for `key`, if any
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	/// Returns the value for `key` if it is present and not blank
	pub fn non_empty(&self, key: &str) -> Option<&str> {
		self.get(key).filter(|value| !value.trim().is_empty())
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
		self.0.insert(key.into(), value.into())
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// All pairs ordered by [label_order]: `alertname` first, then the
	/// remaining keys in ascending lexical order.
	pub fn sorted_pairs(&self) -> Vec<(&str, &str)> {
		let mut pairs: Vec<_> =
			self.0.iter().map(|(key, value)| (key.as_str(), value.as_str())).collect();
		pairs.sort_by(|(left, _), (right, _)| label_order(left, right));
		pairs
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValues {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
	}
}

/// Display order of label keys. [ALERT_NAME_LABEL] sorts before every other
/// key, everything else is compared lexically.
pub fn label_order(left: &str, right: &str) -> Ordering {
	match (left == ALERT_NAME_LABEL, right == ALERT_NAME_LABEL) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Less,
		(false, true) => Ordering::Greater,
		(false, false) => left.cmp(right),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn alertname_is_sorted_first() {
		let labels: KeyValues = [
			("zone", "eu"),
			("alertname", "DiskSpace"),
			("Zebra", "1"),
			("aaa", "first"),
			("instance", "host1"),
		]
		.into_iter()
		.collect();

		let keys: Vec<_> = labels.sorted_pairs().into_iter().map(|(key, _)| key).collect();
		assert_eq!(keys, ["alertname", "Zebra", "aaa", "instance", "zone"]);
	}

	#[test]
	fn sorted_pairs_without_alertname() {
		let labels: KeyValues = [("b", "2"), ("a", "1")].into_iter().collect();

		assert_eq!(labels.sorted_pairs(), [("a", "1"), ("b", "2")]);
	}

	#[test]
	fn empty_object_is_an_empty_notification() {
		let data: AlertGroupNotification = serde_json::from_str("{}").unwrap();

		assert!(data.alerts.is_empty());
		assert_eq!(data.status, AlertStatus::Other(String::new()));
	}

	#[test]
	fn deserialize_alertmanager_payload() {
		let json = r#"{
			"receiver": "discord",
			"status": "firing",
			"alerts": [
				{
					"status": "firing",
					"labels": { "alertname": "DiskSpace", "instance": "host1" },
					"annotations": { "summary": "Disk full" },
					"startsAt": "2022-05-01T10:00:00.000Z",
					"endsAt": "0001-01-01T00:00:00Z",
					"generatorURL": "http://prometheus:9090/graph",
					"fingerprint": "c4a5b6f2d1e0"
				}
			],
			"groupLabels": { "alertname": "DiskSpace" },
			"commonLabels": { "alertname": "DiskSpace", "instance": "host1" },
			"commonAnnotations": { "summary": "Disk full" },
			"externalURL": "http://alertmanager:9093",
			"version": "4",
			"groupKey": "{}:{alertname=\"DiskSpace\"}",
			"truncatedAlerts": 0
		}"#;

		let data: AlertGroupNotification = serde_json::from_str(json).unwrap();

		assert_eq!(data.status, AlertStatus::Firing);
		assert_eq!(data.external_url, "http://alertmanager:9093");
		assert_eq!(data.alerts.len(), 1);

		let alert = &data.alerts[0];
		assert_eq!(alert.labels.get("instance"), Some("host1"));
		assert_eq!(alert.fingerprint, "c4a5b6f2d1e0");
		assert_eq!(alert.generator_url, "http://prometheus:9090/graph");
		assert!(alert.starts_at.is_some());
	}

	#[test]
	fn unknown_status_is_kept() {
		let status: AlertStatus = serde_json::from_str("\"suppressed\"").unwrap();

		assert_eq!(status, AlertStatus::Other("suppressed".to_owned()));
		assert_eq!(serde_json::to_string(&status).unwrap(), "\"suppressed\"");
	}
}
