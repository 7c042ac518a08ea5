// Event module - normalized test lifecycle events

pub mod report;

pub use report::{AggregateReport, TestCaseReport};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle transition carried by a [`NormalizedEvent`].
///
/// Ordered by nesting depth, not by time. [`EventKind::Report`] is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum EventKind {
    #[default]
    None = 0,
    StartRun = 1,
    StartAssembly = 2,
    StartSuite = 3,
    StartTestFixture = 4,
    StartTest = 5,
    EndTest = 6,
    EndTestFixture = 7,
    EndSuite = 8,
    EndAssembly = 9,
    Report = 10,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::None => "None",
            EventKind::StartRun => "StartRun",
            EventKind::StartAssembly => "StartAssembly",
            EventKind::StartSuite => "StartSuite",
            EventKind::StartTestFixture => "StartTestFixture",
            EventKind::StartTest => "StartTest",
            EventKind::EndTest => "EndTest",
            EventKind::EndTestFixture => "EndTestFixture",
            EventKind::EndSuite => "EndSuite",
            EventKind::EndAssembly => "EndAssembly",
            EventKind::Report => "Report",
        }
    }

    /// No events follow a terminal event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Report)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i32> for EventKind {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => EventKind::None,
            1 => EventKind::StartRun,
            2 => EventKind::StartAssembly,
            3 => EventKind::StartSuite,
            4 => EventKind::StartTestFixture,
            5 => EventKind::StartTest,
            6 => EventKind::EndTest,
            7 => EventKind::EndTestFixture,
            8 => EventKind::EndSuite,
            9 => EventKind::EndAssembly,
            10 => EventKind::Report,
            other => return Err(other),
        })
    }
}

/// Test status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum TestStatus {
    #[default]
    Running = 0,
    Pass = 1,
    Fail = 2,
    Skipped = 3,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Running => "Running",
            TestStatus::Pass => "Pass",
            TestStatus::Fail => "Fail",
            TestStatus::Skipped => "Skipped",
        }
    }
}

impl TryFrom<i32> for TestStatus {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => TestStatus::Running,
            1 => TestStatus::Pass,
            2 => TestStatus::Fail,
            3 => TestStatus::Skipped,
            other => return Err(other),
        })
    }
}

/// Sentinel for a timestamp the source did not supply.
pub fn unset_time() -> DateTime<Utc> {
    DateTime::default()
}

pub fn is_unset(time: &DateTime<Utc>) -> bool {
    *time == unset_time()
}

/// Duration between two timestamps, or `declared` when either is unset.
pub fn span_or(start: DateTime<Utc>, end: DateTime<Utc>, declared: Duration) -> Duration {
    if is_unset(&start) || is_unset(&end) {
        return declared;
    }
    (end - start).to_std().unwrap_or(declared)
}

/// One lifecycle transition of the observed test run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NormalizedEvent {
    event: EventKind,

    pub test_run_id: Uuid,
    pub test_runner: String,
    pub process_id: u32,
    pub process_session: u32,
    pub runtime: String,
    pub runtime_version: String,

    pub id: String,
    pub parent_id: Option<String>,
    pub test_suite: Option<String>,
    pub test_name: Option<String>,
    pub full_name: Option<String>,
    pub test_type: Option<String>,

    pub test_result: bool,
    pub test_status: TestStatus,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,

    pub passed: u32,
    pub failed: u32,
    pub warnings: u32,
    pub skipped: u32,
    pub inconclusive: u32,
    pub asserts: u32,
    pub test_cases: u32,
    pub test_count: u32,

    pub test_output: Option<String>,
    pub error_message: Option<String>,
    pub stack_trace: Option<String>,
    pub is_skipped: bool,

    pub report: Option<AggregateReport>,

    /// Consumer-side sequence number; never serialized.
    #[serde(skip)]
    pub run_number: u32,
}

impl NormalizedEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            event: kind,
            ..Default::default()
        }
    }

    pub fn kind(&self) -> EventKind {
        self.event
    }

    /// Display name: the test name, falling back to the suite name.
    pub fn name(&self) -> &str {
        self.test_name
            .as_deref()
            .or(self.test_suite.as_deref())
            .unwrap_or_default()
    }

    /// Set start/end and derive the duration from them when both are known.
    pub fn set_timing(&mut self, start: DateTime<Utc>, end: DateTime<Utc>, declared: Duration) {
        self.start_time = start;
        self.end_time = end;
        self.duration = span_or(start, end, declared);
    }

    /// Record a pass/fail/skip outcome.
    pub fn set_status(&mut self, status: TestStatus) {
        self.test_status = status;
        self.test_result = status == TestStatus::Pass;
        self.is_skipped = status == TestStatus::Skipped;
    }
}

impl fmt::Display for NormalizedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} - {}", self.event, self.name(), self.id)
    }
}

/// Durations travel as fractional seconds in the text formats.
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::try_from_secs_f64(secs).unwrap_or_default())
    }
}
