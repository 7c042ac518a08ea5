// Human-readable console summaries, independent of the wire format

use std::io::{self, Write};
use std::time::Duration;

use crate::codec::Encoded;
use crate::config::{OutputStream, SinkKind};
use crate::error::SinkError;
use crate::event::{EventKind, NormalizedEvent, TestStatus};

enum Target {
    Silent,
    Writer(Box<dyn Write + Send>),
    Trace,
    Debug,
}

pub struct ConsoleSink {
    target: Target,
}

impl ConsoleSink {
    pub fn new(stream: OutputStream) -> Self {
        let target = match stream {
            OutputStream::None => Target::Silent,
            OutputStream::Stdout => Target::Writer(Box::new(io::stdout())),
            OutputStream::Stderr => Target::Writer(Box::new(io::stderr())),
            OutputStream::Trace => Target::Trace,
            OutputStream::Debug => Target::Debug,
        };
        Self { target }
    }

    /// Write summaries to an arbitrary writer instead of a standard stream.
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            target: Target::Writer(writer),
        }
    }

    /// Write one line to the configured target.
    pub fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        match &mut self.target {
            Target::Silent => Ok(()),
            Target::Trace => {
                tracing::info!("{}", line);
                Ok(())
            }
            Target::Debug => {
                tracing::debug!("{}", line);
                Ok(())
            }
            Target::Writer(writer) => writeln!(writer, "{}", line)
                .and_then(|()| writer.flush())
                .map_err(SinkError::Console),
        }
    }
}

impl super::Sink for ConsoleSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Console
    }

    fn deliver(&mut self, event: &NormalizedEvent, _payload: &Encoded) -> Result<(), SinkError> {
        match summary(event) {
            Some(line) => self.write_line(&line),
            None => Ok(()),
        }
    }
}

/// One-line summary of an event, or `None` for kinds with nothing to show.
pub fn summary(event: &NormalizedEvent) -> Option<String> {
    let name = event.name();
    let line = match event.kind() {
        EventKind::None => return None,
        EventKind::StartRun => format!("[StartRun] {} tests", event.test_count),
        EventKind::StartAssembly => format!("[StartAssembly] '{}'", name),
        EventKind::StartSuite => format!("[StartSuite] '{}'", name),
        EventKind::StartTestFixture => format!("[StartFixture] '{}'", name),
        EventKind::StartTest => format!("[StartTest] '{}'", name),
        EventKind::EndTest => format!(
            "[EndTest] '{}' {} in {}",
            name,
            outcome(event.test_status),
            seconds(event.duration)
        ),
        EventKind::EndTestFixture => format!("[EndFixture] '{}' {}", name, counts(event)),
        EventKind::EndSuite => format!("[EndSuite] '{}' {}", name, counts(event)),
        EventKind::EndAssembly => format!("[EndAssembly] '{}' {}", name, counts(event)),
        EventKind::Report => format!(
            "[Report] All tests completed in {}. {} passed {} failures {} skipped",
            seconds(event.duration),
            event.passed,
            event.failed,
            event.skipped
        ),
    };
    Some(line)
}

fn outcome(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Pass => "passed",
        TestStatus::Fail => "failed",
        TestStatus::Skipped => "skipped",
        TestStatus::Running => "running",
    }
}

fn counts(event: &NormalizedEvent) -> String {
    format!(
        "{} passed, {} failed, {} skipped in {}",
        event.passed,
        event.failed,
        event.skipped,
        seconds(event.duration)
    )
}

fn seconds(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}
