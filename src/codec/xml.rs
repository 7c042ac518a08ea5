// Markup encoding - one element tree per event, kept on a single line

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Display;
use std::time::Duration;

use crate::event::{AggregateReport, NormalizedEvent, TestCaseReport};

pub fn encode(event: &NormalizedEvent) -> String {
    let mut xml = String::with_capacity(1024);
    xml.push_str(&format!("<DataEvent Event=\"{}\">", event.kind()));

    element(&mut xml, "TestRunId", event.test_run_id);
    element(&mut xml, "TestRunner", escape(&event.test_runner));
    element(&mut xml, "ProcessId", event.process_id);
    element(&mut xml, "ProcessSession", event.process_session);
    element(&mut xml, "Runtime", escape(&event.runtime));
    element(&mut xml, "RuntimeVersion", escape(&event.runtime_version));
    element(&mut xml, "Id", escape(&event.id));
    optional(&mut xml, "ParentId", &event.parent_id);
    optional(&mut xml, "TestSuite", &event.test_suite);
    optional(&mut xml, "TestName", &event.test_name);
    optional(&mut xml, "FullName", &event.full_name);
    optional(&mut xml, "TestType", &event.test_type);
    element(&mut xml, "TestResult", event.test_result);
    element(&mut xml, "TestStatus", event.test_status.as_str());
    element(&mut xml, "StartTime", timestamp(&event.start_time));
    element(&mut xml, "EndTime", timestamp(&event.end_time));
    element(&mut xml, "Duration", seconds(event.duration));
    element(&mut xml, "Passed", event.passed);
    element(&mut xml, "Failed", event.failed);
    element(&mut xml, "Warnings", event.warnings);
    element(&mut xml, "Skipped", event.skipped);
    element(&mut xml, "Inconclusive", event.inconclusive);
    element(&mut xml, "Asserts", event.asserts);
    element(&mut xml, "TestCases", event.test_cases);
    element(&mut xml, "TestCount", event.test_count);
    optional(&mut xml, "TestOutput", &event.test_output);
    optional(&mut xml, "ErrorMessage", &event.error_message);
    optional(&mut xml, "StackTrace", &event.stack_trace);
    element(&mut xml, "IsSkipped", event.is_skipped);

    if let Some(report) = &event.report {
        report_element(&mut xml, report);
    }

    xml.push_str("</DataEvent>");
    xml
}

fn report_element(xml: &mut String, report: &AggregateReport) {
    xml.push_str(&format!("<Report TotalTests=\"{}\">", report.total_tests));
    for case in &report.test_reports {
        case_element(xml, case);
    }
    xml.push_str("</Report>");
}

fn case_element(xml: &mut String, case: &TestCaseReport) {
    xml.push_str(&format!("<TestCaseReport Id=\"{}\">", escape(&case.id)));
    optional(xml, "ParentId", &case.parent_id);
    element(xml, "Runtime", escape(&case.runtime));
    element(xml, "RuntimeVersion", escape(&case.runtime_version));
    optional(xml, "TestSuite", &case.test_suite);
    optional(xml, "TestName", &case.test_name);
    optional(xml, "FullName", &case.full_name);
    element(xml, "TestResult", case.test_result);
    element(xml, "TestStatus", case.test_status.as_str());
    element(xml, "StartTime", timestamp(&case.start_time));
    element(xml, "EndTime", timestamp(&case.end_time));
    element(xml, "Duration", seconds(case.duration));
    optional(xml, "TestOutput", &case.test_output);
    optional(xml, "ErrorMessage", &case.error_message);
    optional(xml, "StackTrace", &case.stack_trace);
    element(xml, "Asserts", case.asserts);
    element(xml, "IsSkipped", case.is_skipped);
    xml.push_str("</TestCaseReport>");
}

/// Caller escapes string values; numbers and flags need no escaping.
fn element(xml: &mut String, name: &str, value: impl Display) {
    xml.push_str(&format!("<{name}>{value}</{name}>"));
}

fn optional(xml: &mut String, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        element(xml, name, escape(value));
    }
}

fn timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn seconds(duration: Duration) -> String {
    format!("{:.6}", duration.as_secs_f64())
}

/// Escape markup characters and line breaks so the record stays on one line.
/// Characters XML cannot carry at all become U+FFFD.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' => escaped.push_str("&#9;"),
            '\u{0}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}' => escaped.push(char::REPLACEMENT_CHARACTER),
            other => escaped.push(other),
        }
    }
    escaped
}
