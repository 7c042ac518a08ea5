// Lenient attribute extraction for report fragments
//
// Every helper here is total: absent or malformed input yields a default
// (zero, the unset timestamp, None) instead of an error.

use chrono::{DateTime, NaiveDateTime, Utc};
use roxmltree::Node;
use std::time::Duration;

use crate::event::{TestStatus, unset_time};

/// Property carrying the reason a test was skipped.
pub const SKIP_REASON_PROPERTY: &str = "_SKIPREASON";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn text_attr(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.attribute(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Attribute as a count; absent or malformed yields 0.
pub fn count_attr(node: Node<'_, '_>, name: &str) -> u32 {
    node.attribute(name)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

/// Attribute as fractional seconds; absent, malformed or negative yields zero.
pub fn seconds_attr(node: Node<'_, '_>, name: &str) -> Duration {
    node.attribute(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or_default()
}

/// Attribute as a UTC timestamp; absent or malformed yields the unset sentinel.
pub fn timestamp_attr(node: Node<'_, '_>, name: &str) -> DateTime<Utc> {
    node.attribute(name)
        .and_then(parse_timestamp)
        .unwrap_or_else(unset_time)
}

/// Accepts RFC 3339 and the zone-less forms test engines commonly emit,
/// which are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
        .map(|dt| dt.and_utc())
}

/// Map a result string to a status. Anything unrecognised is a failure.
pub fn outcome(result: Option<&str>) -> TestStatus {
    let result = result.map(str::trim).unwrap_or_default();
    if result.eq_ignore_ascii_case("passed") {
        TestStatus::Pass
    } else if result.eq_ignore_ascii_case("skipped") {
        TestStatus::Skipped
    } else {
        TestStatus::Fail
    }
}

pub fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.has_tag_name(name))
}

/// Text content of a child element, e.g. `<output>`.
pub fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name).and_then(element_text)
}

/// Text content of `<outer><inner>` below `node`.
pub fn nested_text(node: Node<'_, '_>, outer: &str, inner: &str) -> Option<String> {
    child(node, outer)
        .and_then(|n| child(n, inner))
        .and_then(element_text)
}

/// Value of a named property under `<properties>`.
pub fn property(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, "properties")?
        .children()
        .filter(|p| p.is_element() && p.has_tag_name("property"))
        .find(|p| p.attribute("name") == Some(name))
        .and_then(|p| p.attribute("value"))
        .map(str::to_string)
}

fn element_text(node: Node<'_, '_>) -> Option<String> {
    let text: String = node
        .children()
        .filter(|c| c.is_text())
        .filter_map(|c| c.text())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
