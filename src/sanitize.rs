//! cleaning and length limiting of text that ends up in discord embeds
//!
//! Alertmanager templates leave behind artifacts like `map[]` or `(instance )`
//! when a label is missing. Every piece of alert text passes through here
//! before it is rendered.

/// values that carry no information and are treated as absent
pub const PLACEHOLDER_TOKENS: [&str; 8] = [
	"-",
	"...",
	"No details available",
	"map[]",
	"(instance )",
	"(instance)",
	"undefined",
	"null",
];

/// placeholder tokens that are removed from anywhere inside a value
pub const PLACEHOLDER_FRAGMENTS: [&str; 3] = ["map[]", "(instance )", "(instance)"];

/// label values the label formatter skips
pub const EMPTY_LABEL_VALUES: [&str; 5] = ["map[]", "(instance)", "(instance )", "undefined", "null"];

/// substrings that mark a cleaned value as garbage
const GARBAGE_SUBSTRINGS: [&str; 2] = ["undefined", "null"];

/// suffix appended to truncated text
pub const ELLIPSIS: &str = "...";

/// Returns true if `value` is exactly one of the [PLACEHOLDER_TOKENS]
pub fn is_placeholder(value: &str) -> bool {
	PLACEHOLDER_TOKENS.contains(&value)
}

/// Removes all [PLACEHOLDER_FRAGMENTS] from `value` and trims the result.
pub fn clean(value: &str) -> String {
	let mut cleaned = value.trim().to_owned();

	for fragment in PLACEHOLDER_FRAGMENTS {
		if cleaned.contains(fragment) {
			cleaned = cleaned.replace(fragment, "").trim().to_owned();
		}
	}

	cleaned
}

/// Checks whether a name/value pair can be rendered as an embed field.
///
/// Both sides are trimmed first. The pair is rejected if either side is empty
/// or a placeholder token, or if the cleaned value is empty or still contains
/// `undefined`/`null`.
pub fn is_valid_field(name: &str, value: &str) -> bool {
	let name = name.trim();
	let value = value.trim();

	if name.is_empty() || value.is_empty() {
		return false;
	}

	if is_placeholder(name) || is_placeholder(value) {
		return false;
	}

	let value = clean(value);

	!value.is_empty() && !GARBAGE_SUBSTRINGS.iter().any(|garbage| value.contains(garbage))
}

/// Cleans an annotation for display as a field value. Returns `None` if the
/// value is empty or nothing but a placeholder token once cleaned.
pub fn field_value(value: &str) -> Option<String> {
	let value = value.trim();
	if is_placeholder(value) {
		return None;
	}

	let cleaned = clean(value);
	if cleaned.is_empty() || is_placeholder(&cleaned) {
		return None;
	}

	Some(cleaned)
}

/// Length of `value` in characters.
pub fn char_len(value: &str) -> usize {
	value.chars().count()
}

/// Cuts `value` down to at most `max` characters.
///
/// Strings longer than `max` keep their first `max - 3` characters followed by
/// `...`. Shorter strings are returned unchanged, which makes truncation
/// idempotent.
pub fn truncate(value: &str, max: usize) -> String {
	if char_len(value) <= max {
		return value.to_owned();
	}

	let keep = max.saturating_sub(ELLIPSIS.len());
	let mut truncated: String = value.chars().take(keep).collect();
	truncated.push_str(ELLIPSIS);
	truncated
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn truncate_keeps_short_strings() {
		assert_eq!(truncate("disk full", 20), "disk full");
		assert_eq!(truncate("exactly", 7), "exactly");
	}

	#[test]
	fn truncate_appends_ellipsis() {
		assert_eq!(truncate("abcdefghij", 8), "abcde...");
		assert_eq!(char_len(&truncate("abcdefghij", 8)), 8);
	}

	#[test]
	fn truncate_is_idempotent_and_bounded() {
		let inputs = ["", "a", "short text", "ünïcödé ünïcödé ünïcödé", &"x".repeat(5000)];

		for input in inputs {
			for max in [4, 5, 10, 22, 250, 1000] {
				let once = truncate(input, max);
				assert!(char_len(&once) <= max, "{input:?} truncated to {max} is {once:?}");
				assert_eq!(truncate(&once, max), once);
			}
		}
	}

	#[test]
	fn truncate_does_not_split_characters() {
		assert_eq!(truncate("🔥🔥🔥🔥🔥🔥", 5), "🔥🔥...");
	}

	#[test]
	fn clean_removes_fragments() {
		assert_eq!(clean("  Disk full (instance )  "), "Disk full");
		assert_eq!(clean("map[] high load (instance) "), "high load");
		assert_eq!(clean("map[]"), "");
	}

	#[test]
	fn placeholders_are_not_valid_fields() {
		for token in PLACEHOLDER_TOKENS {
			assert!(!is_valid_field("Message", token), "{token}");
			assert!(!is_valid_field(token, "value"), "{token}");
		}
	}

	#[test]
	fn blank_fields_are_rejected() {
		assert!(!is_valid_field("  ", "value"));
		assert!(!is_valid_field("Message", " \n\t"));
		assert!(!is_valid_field("Message", "map[] (instance)"));
	}

	#[test]
	fn garbage_substrings_are_rejected() {
		assert!(!is_valid_field("Message", "value is undefined"));
		assert!(!is_valid_field("Message", "got null back"));
		assert!(is_valid_field("Message", "disk /var is 95% full"));
	}

	#[test]
	fn field_value_returns_cleaned_text() {
		assert_eq!(field_value(" load is high (instance ) ").as_deref(), Some("load is high"));
		assert_eq!(field_value("-"), None);
		assert_eq!(field_value("map[] (instance)"), None);
		assert_eq!(field_value(" null "), None);
		assert_eq!(field_value("map[] ..."), None);
	}

	#[test]
	fn field_value_keeps_words_containing_null() {
		assert_eq!(
			field_value("upstream returned null body for 5m").as_deref(),
			Some("upstream returned null body for 5m")
		);
		assert_eq!(field_value("annulled orders").as_deref(), Some("annulled orders"));
	}
}
