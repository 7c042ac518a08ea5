// Translate module - report fragments to normalized events

pub mod attributes;

use roxmltree::{Document, Node};
use std::sync::Arc;

use crate::error::TranslateError;
use crate::event::{
    AggregateReport, EventKind, NormalizedEvent, TestCaseReport, TestStatus, span_or,
};
use crate::runtime::RuntimeIdentity;
use attributes::{
    SKIP_REASON_PROPERTY, child_text, count_attr, nested_text, outcome, property, seconds_attr,
    text_attr, timestamp_attr,
};

/// Root element names of the fragments a host delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentTag {
    StartRun,
    StartSuite,
    StartTest,
    TestCase,
    TestSuite,
    TestRun,
}

impl FragmentTag {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "start-run" => Some(Self::StartRun),
            "start-suite" => Some(Self::StartSuite),
            "start-test" => Some(Self::StartTest),
            "test-case" => Some(Self::TestCase),
            "test-suite" => Some(Self::TestSuite),
            "test-run" => Some(Self::TestRun),
            _ => None,
        }
    }
}

/// Granularity of a suite fragment, taken from its `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteType {
    Assembly,
    TestFixture,
    /// Namespaces, parameterized groupings and anything unrecognised
    Suite,
}

impl SuiteType {
    pub fn of(node: Node<'_, '_>) -> Self {
        match node.attribute("type").map(str::trim) {
            Some(t) if t.eq_ignore_ascii_case("Assembly") => Self::Assembly,
            Some(t) if t.eq_ignore_ascii_case("TestFixture") => Self::TestFixture,
            _ => Self::Suite,
        }
    }

    fn start_kind(&self) -> EventKind {
        match self {
            Self::Assembly => EventKind::StartAssembly,
            Self::TestFixture => EventKind::StartTestFixture,
            Self::Suite => EventKind::StartSuite,
        }
    }

    fn end_kind(&self) -> EventKind {
        match self {
            Self::Assembly => EventKind::EndAssembly,
            Self::TestFixture => EventKind::EndTestFixture,
            Self::Suite => EventKind::EndSuite,
        }
    }
}

/// Stateless mapping from report fragments to [`NormalizedEvent`]s.
#[derive(Debug, Clone)]
pub struct Translator {
    identity: Arc<RuntimeIdentity>,
}

impl Translator {
    pub fn new(identity: Arc<RuntimeIdentity>) -> Self {
        Self { identity }
    }

    /// Parse one markup fragment and translate its root element.
    pub fn translate(&self, fragment: &str) -> Result<Vec<NormalizedEvent>, TranslateError> {
        let doc = Document::parse(fragment)?;
        Ok(self.translate_node(doc.root_element()))
    }

    /// Translate an already parsed fragment root. Unknown roots yield nothing.
    pub fn translate_node(&self, root: Node<'_, '_>) -> Vec<NormalizedEvent> {
        let Some(tag) = FragmentTag::from_name(root.tag_name().name()) else {
            tracing::trace!(tag = root.tag_name().name(), "Ignoring fragment");
            return Vec::new();
        };

        let event = match tag {
            FragmentTag::StartRun => self.start_run(root),
            FragmentTag::StartSuite => self.start_suite(root),
            FragmentTag::StartTest => self.start_test(root),
            FragmentTag::TestCase => self.end_test(root),
            FragmentTag::TestSuite => self.end_suite(root),
            FragmentTag::TestRun => self.end_run(root),
        };

        vec![event]
    }

    fn start_run(&self, node: Node<'_, '_>) -> NormalizedEvent {
        let mut event = identified(EventKind::StartRun, node);
        event.test_count = count_attr(node, "count");
        event.start_time = timestamp_attr(node, "start-time");
        event
    }

    fn start_suite(&self, node: Node<'_, '_>) -> NormalizedEvent {
        let mut event = identified(SuiteType::of(node).start_kind(), node);
        event.test_suite = text_attr(node, "name");
        event.start_time = timestamp_attr(node, "start-time");
        event
    }

    fn start_test(&self, node: Node<'_, '_>) -> NormalizedEvent {
        let mut event = identified(EventKind::StartTest, node);
        event.test_name = text_attr(node, "name");
        event.test_suite = text_attr(node, "classname");
        event.start_time = timestamp_attr(node, "start-time");
        event
    }

    fn end_test(&self, node: Node<'_, '_>) -> NormalizedEvent {
        let case = self.test_case(node);

        let mut event = identified(EventKind::EndTest, node);
        event.test_name = case.test_name;
        event.test_suite = case.test_suite;
        event.set_timing(case.start_time, case.end_time, case.duration);
        event.set_status(case.test_status);
        event.asserts = case.asserts;
        event.test_output = case.test_output;
        event.error_message = case.error_message;
        event.stack_trace = case.stack_trace;
        event
    }

    fn end_suite(&self, node: Node<'_, '_>) -> NormalizedEvent {
        let mut event = identified(SuiteType::of(node).end_kind(), node);
        event.test_suite = text_attr(node, "name");
        summarize(&mut event, node);
        event
    }

    fn end_run(&self, node: Node<'_, '_>) -> NormalizedEvent {
        let mut event = identified(EventKind::Report, node);
        event.test_name = text_attr(node, "name");
        summarize(&mut event, node);

        let total_tests = match node.attribute("total") {
            Some(_) => count_attr(node, "total"),
            None => count_attr(node, "testcasecount"),
        };

        let test_reports = node
            .descendants()
            .filter(|n| n.is_element() && n.has_tag_name("test-case"))
            .map(|n| self.test_case(n))
            .collect();

        event.report = Some(AggregateReport {
            total_tests,
            test_reports,
        });
        event
    }

    /// Leaf summary of a `<test-case>` element.
    fn test_case(&self, node: Node<'_, '_>) -> TestCaseReport {
        let status = outcome(node.attribute("result"));
        let start_time = timestamp_attr(node, "start-time");
        let end_time = timestamp_attr(node, "end-time");

        TestCaseReport {
            id: node.attribute("id").unwrap_or_default().to_string(),
            parent_id: text_attr(node, "parentId"),
            runtime: self.identity.runtime.clone(),
            runtime_version: self.identity.runtime_version.clone(),
            test_suite: node
                .parent_element()
                .filter(|p| p.has_tag_name("test-suite"))
                .and_then(|p| text_attr(p, "name"))
                .or_else(|| text_attr(node, "classname")),
            test_name: text_attr(node, "name"),
            full_name: text_attr(node, "fullname"),
            test_result: status == TestStatus::Pass,
            test_status: status,
            start_time,
            end_time,
            duration: span_or(start_time, end_time, seconds_attr(node, "duration")),
            test_output: child_text(node, "output"),
            error_message: error_message(node, status),
            stack_trace: nested_text(node, "failure", "stack-trace"),
            asserts: count_attr(node, "asserts"),
            is_skipped: status == TestStatus::Skipped,
        }
    }
}

/// Event with the identity attributes every fragment carries.
fn identified(kind: EventKind, node: Node<'_, '_>) -> NormalizedEvent {
    let mut event = NormalizedEvent::new(kind);
    event.id = node.attribute("id").unwrap_or_default().to_string();
    event.parent_id = text_attr(node, "parentId");
    event.full_name = text_attr(node, "fullname");
    event.test_type = text_attr(node, "type");
    event
}

/// Timing, outcome and counters of a finished suite or run.
fn summarize(event: &mut NormalizedEvent, node: Node<'_, '_>) {
    event.set_timing(
        timestamp_attr(node, "start-time"),
        timestamp_attr(node, "end-time"),
        seconds_attr(node, "duration"),
    );
    let status = outcome(node.attribute("result"));
    event.set_status(status);
    event.test_count = count_attr(node, "total");
    event.test_cases = count_attr(node, "testcasecount");
    event.passed = count_attr(node, "passed");
    event.failed = count_attr(node, "failed");
    event.warnings = count_attr(node, "warnings");
    event.inconclusive = count_attr(node, "inconclusive");
    event.skipped = count_attr(node, "skipped");
    event.asserts = count_attr(node, "asserts");
    event.error_message = error_message(node, status);
    event.stack_trace = nested_text(node, "failure", "stack-trace");
}

/// Failure message, with a skip reason taking precedence for skipped tests.
fn error_message(node: Node<'_, '_>, status: TestStatus) -> Option<String> {
    let generic = || {
        nested_text(node, "failure", "message").or_else(|| nested_text(node, "reason", "message"))
    };

    match status {
        TestStatus::Skipped => property(node, SKIP_REASON_PROPERTY).or_else(generic),
        _ => generic(),
    }
}
