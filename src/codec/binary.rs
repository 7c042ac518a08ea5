// Binary encoding - protobuf records
//
// Field tags are part of the wire contract with consumers; never renumber.

use chrono::{DateTime, Utc};
use prost::Message;
use std::time::Duration;
use uuid::Uuid;

use crate::error::CodecError;
use crate::event::{
    AggregateReport, EventKind, NormalizedEvent, TestCaseReport, TestStatus, unset_time,
};

#[derive(Clone, PartialEq, Message)]
pub struct EventRecord {
    #[prost(int32, tag = "1")]
    pub event: i32,
    #[prost(string, tag = "2")]
    pub test_run_id: String,
    #[prost(string, tag = "3")]
    pub test_runner: String,
    #[prost(uint32, tag = "4")]
    pub process_id: u32,
    #[prost(uint32, tag = "5")]
    pub process_session: u32,
    #[prost(string, tag = "6")]
    pub runtime: String,
    #[prost(string, tag = "7")]
    pub runtime_version: String,
    #[prost(string, tag = "8")]
    pub id: String,
    #[prost(string, optional, tag = "9")]
    pub parent_id: Option<String>,
    #[prost(string, optional, tag = "10")]
    pub test_suite: Option<String>,
    #[prost(string, optional, tag = "11")]
    pub test_name: Option<String>,
    #[prost(string, optional, tag = "12")]
    pub full_name: Option<String>,
    #[prost(string, optional, tag = "13")]
    pub test_type: Option<String>,
    #[prost(bool, tag = "14")]
    pub test_result: bool,
    #[prost(int32, tag = "15")]
    pub test_status: i32,
    #[prost(message, optional, tag = "16")]
    pub start_time: Option<prost_types::Timestamp>,
    #[prost(message, optional, tag = "17")]
    pub end_time: Option<prost_types::Timestamp>,
    #[prost(message, optional, tag = "18")]
    pub duration: Option<prost_types::Duration>,
    #[prost(uint32, tag = "19")]
    pub passed: u32,
    #[prost(uint32, tag = "20")]
    pub failed: u32,
    #[prost(uint32, tag = "21")]
    pub warnings: u32,
    #[prost(uint32, tag = "22")]
    pub skipped: u32,
    #[prost(uint32, tag = "23")]
    pub inconclusive: u32,
    #[prost(uint32, tag = "24")]
    pub asserts: u32,
    #[prost(uint32, tag = "25")]
    pub test_cases: u32,
    #[prost(uint32, tag = "26")]
    pub test_count: u32,
    #[prost(string, optional, tag = "27")]
    pub test_output: Option<String>,
    #[prost(string, optional, tag = "28")]
    pub error_message: Option<String>,
    #[prost(string, optional, tag = "29")]
    pub stack_trace: Option<String>,
    #[prost(bool, tag = "30")]
    pub is_skipped: bool,
    #[prost(message, optional, tag = "31")]
    pub report: Option<ReportRecord>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReportRecord {
    #[prost(uint32, tag = "1")]
    pub total_tests: u32,
    #[prost(message, repeated, tag = "2")]
    pub test_reports: Vec<TestCaseRecord>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TestCaseRecord {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, optional, tag = "2")]
    pub parent_id: Option<String>,
    #[prost(string, tag = "3")]
    pub runtime: String,
    #[prost(string, tag = "4")]
    pub runtime_version: String,
    #[prost(string, optional, tag = "5")]
    pub test_suite: Option<String>,
    #[prost(string, optional, tag = "6")]
    pub test_name: Option<String>,
    #[prost(string, optional, tag = "7")]
    pub full_name: Option<String>,
    #[prost(bool, tag = "8")]
    pub test_result: bool,
    #[prost(int32, tag = "9")]
    pub test_status: i32,
    #[prost(message, optional, tag = "10")]
    pub start_time: Option<prost_types::Timestamp>,
    #[prost(message, optional, tag = "11")]
    pub end_time: Option<prost_types::Timestamp>,
    #[prost(message, optional, tag = "12")]
    pub duration: Option<prost_types::Duration>,
    #[prost(string, optional, tag = "13")]
    pub test_output: Option<String>,
    #[prost(string, optional, tag = "14")]
    pub error_message: Option<String>,
    #[prost(string, optional, tag = "15")]
    pub stack_trace: Option<String>,
    #[prost(uint32, tag = "16")]
    pub asserts: u32,
    #[prost(bool, tag = "17")]
    pub is_skipped: bool,
}

pub fn encode(event: &NormalizedEvent) -> Vec<u8> {
    EventRecord::from(event).encode_to_vec()
}

pub fn decode(payload: &[u8]) -> Result<NormalizedEvent, CodecError> {
    EventRecord::decode(payload)?.try_into()
}

impl From<&NormalizedEvent> for EventRecord {
    fn from(event: &NormalizedEvent) -> Self {
        Self {
            event: event.kind() as i32,
            test_run_id: event.test_run_id.to_string(),
            test_runner: event.test_runner.clone(),
            process_id: event.process_id,
            process_session: event.process_session,
            runtime: event.runtime.clone(),
            runtime_version: event.runtime_version.clone(),
            id: event.id.clone(),
            parent_id: event.parent_id.clone(),
            test_suite: event.test_suite.clone(),
            test_name: event.test_name.clone(),
            full_name: event.full_name.clone(),
            test_type: event.test_type.clone(),
            test_result: event.test_result,
            test_status: event.test_status as i32,
            start_time: Some(to_timestamp(&event.start_time)),
            end_time: Some(to_timestamp(&event.end_time)),
            duration: Some(to_duration(event.duration)),
            passed: event.passed,
            failed: event.failed,
            warnings: event.warnings,
            skipped: event.skipped,
            inconclusive: event.inconclusive,
            asserts: event.asserts,
            test_cases: event.test_cases,
            test_count: event.test_count,
            test_output: event.test_output.clone(),
            error_message: event.error_message.clone(),
            stack_trace: event.stack_trace.clone(),
            is_skipped: event.is_skipped,
            report: event.report.as_ref().map(ReportRecord::from),
        }
    }
}

impl TryFrom<EventRecord> for NormalizedEvent {
    type Error = CodecError;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        let kind = EventKind::try_from(record.event).map_err(|value| CodecError::UnknownValue {
            field: "event",
            value,
        })?;

        let mut event = NormalizedEvent::new(kind);
        event.test_run_id = Uuid::parse_str(&record.test_run_id).unwrap_or_default();
        event.test_runner = record.test_runner;
        event.process_id = record.process_id;
        event.process_session = record.process_session;
        event.runtime = record.runtime;
        event.runtime_version = record.runtime_version;
        event.id = record.id;
        event.parent_id = record.parent_id;
        event.test_suite = record.test_suite;
        event.test_name = record.test_name;
        event.full_name = record.full_name;
        event.test_type = record.test_type;
        event.test_result = record.test_result;
        event.test_status = status(record.test_status)?;
        event.start_time = from_timestamp(record.start_time);
        event.end_time = from_timestamp(record.end_time);
        event.duration = from_duration(record.duration);
        event.passed = record.passed;
        event.failed = record.failed;
        event.warnings = record.warnings;
        event.skipped = record.skipped;
        event.inconclusive = record.inconclusive;
        event.asserts = record.asserts;
        event.test_cases = record.test_cases;
        event.test_count = record.test_count;
        event.test_output = record.test_output;
        event.error_message = record.error_message;
        event.stack_trace = record.stack_trace;
        event.is_skipped = record.is_skipped;
        event.report = record.report.map(AggregateReport::try_from).transpose()?;
        Ok(event)
    }
}

impl From<&AggregateReport> for ReportRecord {
    fn from(report: &AggregateReport) -> Self {
        Self {
            total_tests: report.total_tests,
            test_reports: report.test_reports.iter().map(TestCaseRecord::from).collect(),
        }
    }
}

impl TryFrom<ReportRecord> for AggregateReport {
    type Error = CodecError;

    fn try_from(record: ReportRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            total_tests: record.total_tests,
            test_reports: record
                .test_reports
                .into_iter()
                .map(TestCaseReport::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl From<&TestCaseReport> for TestCaseRecord {
    fn from(case: &TestCaseReport) -> Self {
        Self {
            id: case.id.clone(),
            parent_id: case.parent_id.clone(),
            runtime: case.runtime.clone(),
            runtime_version: case.runtime_version.clone(),
            test_suite: case.test_suite.clone(),
            test_name: case.test_name.clone(),
            full_name: case.full_name.clone(),
            test_result: case.test_result,
            test_status: case.test_status as i32,
            start_time: Some(to_timestamp(&case.start_time)),
            end_time: Some(to_timestamp(&case.end_time)),
            duration: Some(to_duration(case.duration)),
            test_output: case.test_output.clone(),
            error_message: case.error_message.clone(),
            stack_trace: case.stack_trace.clone(),
            asserts: case.asserts,
            is_skipped: case.is_skipped,
        }
    }
}

impl TryFrom<TestCaseRecord> for TestCaseReport {
    type Error = CodecError;

    fn try_from(record: TestCaseRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            parent_id: record.parent_id,
            runtime: record.runtime,
            runtime_version: record.runtime_version,
            test_suite: record.test_suite,
            test_name: record.test_name,
            full_name: record.full_name,
            test_result: record.test_result,
            test_status: status(record.test_status)?,
            start_time: from_timestamp(record.start_time),
            end_time: from_timestamp(record.end_time),
            duration: from_duration(record.duration),
            test_output: record.test_output,
            error_message: record.error_message,
            stack_trace: record.stack_trace,
            asserts: record.asserts,
            is_skipped: record.is_skipped,
        })
    }
}

fn status(value: i32) -> Result<TestStatus, CodecError> {
    TestStatus::try_from(value).map_err(|value| CodecError::UnknownValue {
        field: "test_status",
        value,
    })
}

fn to_timestamp(time: &DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: time.timestamp(),
        nanos: time.timestamp_subsec_nanos() as i32,
    }
}

fn from_timestamp(timestamp: Option<prost_types::Timestamp>) -> DateTime<Utc> {
    timestamp
        .and_then(|ts| {
            let nanos = u32::try_from(ts.nanos).ok()?;
            DateTime::from_timestamp(ts.seconds, nanos)
        })
        .unwrap_or_else(unset_time)
}

fn to_duration(duration: Duration) -> prost_types::Duration {
    prost_types::Duration {
        seconds: i64::try_from(duration.as_secs()).unwrap_or(i64::MAX),
        nanos: duration.subsec_nanos() as i32,
    }
}

fn from_duration(duration: Option<prost_types::Duration>) -> Duration {
    duration
        .and_then(|d| {
            let secs = u64::try_from(d.seconds).ok()?;
            let nanos = u32::try_from(d.nanos).ok()?;
            Some(Duration::new(secs, nanos))
        })
        .unwrap_or_default()
}
