// End-of-run aggregate report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{TestStatus, duration_secs};

/// Attached only to the terminal [`super::EventKind::Report`] event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AggregateReport {
    /// Total declared by the run itself; may exceed `test_reports.len()`
    pub total_tests: u32,

    /// Leaf test summaries in document order
    pub test_reports: Vec<TestCaseReport>,
}

/// Snapshot of one leaf test, owned by its [`AggregateReport`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestCaseReport {
    pub id: String,
    pub parent_id: Option<String>,
    pub runtime: String,
    pub runtime_version: String,

    pub test_suite: Option<String>,
    pub test_name: Option<String>,
    pub full_name: Option<String>,

    pub test_result: bool,
    pub test_status: TestStatus,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,

    pub test_output: Option<String>,
    pub error_message: Option<String>,
    pub stack_trace: Option<String>,
    pub asserts: u32,
    pub is_skipped: bool,
}
