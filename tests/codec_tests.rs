use chrono::{TimeZone, Utc};
use std::time::Duration;
use testmonitor::codec::{self, Encoded, WireFormat};
use testmonitor::event::{AggregateReport, TestCaseReport};
use testmonitor::{EventKind, NormalizedEvent, TestStatus};
use uuid::Uuid;

fn populated_event() -> NormalizedEvent {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::milliseconds(250);
    let end = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 42).unwrap();

    let mut event = NormalizedEvent::new(EventKind::Report);
    event.test_run_id = Uuid::new_v4();
    event.test_runner = "nunit3-console".to_string();
    event.process_id = 4242;
    event.process_session = 7;
    event.runtime = "native".to_string();
    event.runtime_version = "1.2.3".to_string();
    event.id = "0-1000".to_string();
    event.parent_id = Some("0-1".to_string());
    event.test_suite = Some("Suite".to_string());
    event.test_name = Some("Run".to_string());
    event.full_name = Some("NS.Suite.Run".to_string());
    event.test_type = Some("TestRun".to_string());
    event.set_status(TestStatus::Fail);
    event.set_timing(start, end, Duration::ZERO);
    event.passed = 10;
    event.failed = 2;
    event.warnings = 1;
    event.skipped = 3;
    event.inconclusive = 4;
    event.asserts = 99;
    event.test_cases = 19;
    event.test_count = 20;
    event.test_output = Some("stdout line".to_string());
    event.error_message = Some("two failures".to_string());
    event.stack_trace = Some("at A()\n   at B()".to_string());
    event.report = Some(AggregateReport {
        total_tests: 20,
        test_reports: vec![
            TestCaseReport {
                id: "0-1001".to_string(),
                parent_id: Some("0-1000".to_string()),
                runtime: "native".to_string(),
                runtime_version: "1.2.3".to_string(),
                test_suite: Some("Suite".to_string()),
                test_name: Some("Passes".to_string()),
                full_name: Some("NS.Suite.Passes".to_string()),
                test_result: true,
                test_status: TestStatus::Pass,
                start_time: start,
                end_time: end,
                duration: Duration::from_millis(1500),
                test_output: None,
                error_message: None,
                stack_trace: None,
                asserts: 3,
                is_skipped: false,
            },
            TestCaseReport {
                id: "0-1002".to_string(),
                test_status: TestStatus::Skipped,
                is_skipped: true,
                error_message: Some("flaky".to_string()),
                ..Default::default()
            },
        ],
    });
    event
}

#[test]
fn test_binary_round_trip_preserves_every_field() {
    let mut event = populated_event();
    event.run_number = 17;

    let encoded = codec::encode(&event, WireFormat::Binary).expect("encode");
    let Encoded::Binary(bytes) = &encoded else {
        panic!("binary format must produce bytes");
    };

    let decoded = codec::decode(bytes, WireFormat::Binary).expect("decode");
    assert_eq!(decoded.run_number, 0);

    event.run_number = 0;
    assert_eq!(decoded, event);
}

#[test]
fn test_json_round_trip_preserves_every_field() {
    let mut event = populated_event();
    event.run_number = 5;

    let encoded = codec::encode(&event, WireFormat::Json).expect("encode");
    let text = encoded.as_text().expect("json is text");
    assert!(!text.contains("RunNumber"));

    let decoded = codec::decode(encoded.as_bytes(), WireFormat::Json).expect("decode");
    event.run_number = 0;
    assert_eq!(decoded, event);
}

#[test]
fn test_json_uses_consumer_field_names() {
    let encoded = codec::encode(&populated_event(), WireFormat::Json).expect("encode");
    let value: serde_json::Value = serde_json::from_slice(encoded.as_bytes()).expect("json");

    assert_eq!(value["Event"], "Report");
    assert_eq!(value["TestStatus"], "Fail");
    assert_eq!(value["TestResult"], false);
    assert_eq!(value["ProcessId"], 4242);
    assert_eq!(value["Report"]["TotalTests"], 20);
    assert_eq!(value["Report"]["TestReports"][1]["IsSkipped"], true);
    assert_eq!(value["Duration"], 41.75);
}

#[test]
fn test_markup_is_not_decodable() {
    let encoded = codec::encode(&populated_event(), WireFormat::Xml).expect("encode");
    assert!(codec::decode(encoded.as_bytes(), WireFormat::Xml).is_err());
}
