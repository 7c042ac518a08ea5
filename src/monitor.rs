// Host entry point
//
// The host hands over raw report fragments and expects nothing back. Every
// failure below this point is logged and absorbed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::{Config, SinkKind};
use crate::emitter::{Delivery, Emitter};
use crate::error::MonitorError;
use crate::runtime::RuntimeIdentity;
use crate::sink::ConsoleSink;
use crate::translate::Translator;

struct Pipeline {
    translator: Translator,
    emitter: Emitter,
}

/// Listener the host test engine calls for every lifecycle fragment.
///
/// An inactive monitor (runner gate not met, or setup failed) accepts and
/// ignores every fragment.
pub struct TestMonitor {
    identity: Arc<RuntimeIdentity>,
    pipeline: Option<Pipeline>,
}

impl TestMonitor {
    /// Activate from configuration, falling back to an inert monitor.
    pub fn activate(config: &Config, identity: RuntimeIdentity) -> Self {
        let identity = Arc::new(identity);
        match Self::build(config, Arc::clone(&identity)) {
            Ok(pipeline) => Self {
                identity,
                pipeline,
            },
            Err(e) => {
                tracing::error!(operation = "activate", error = %e, "testmonitor disabled");
                Self {
                    identity,
                    pipeline: None,
                }
            }
        }
    }

    /// Like [`TestMonitor::activate`], but reports setup failures.
    pub fn try_activate(config: &Config, identity: RuntimeIdentity) -> Result<Self, MonitorError> {
        let identity = Arc::new(identity);
        let pipeline = Self::build(config, Arc::clone(&identity))?;
        Ok(Self { identity, pipeline })
    }

    /// Monitor around an already assembled emitter.
    pub fn with_emitter(identity: RuntimeIdentity, emitter: Emitter) -> Self {
        let identity = Arc::new(identity);
        Self {
            pipeline: Some(Pipeline {
                translator: Translator::new(Arc::clone(&identity)),
                emitter,
            }),
            identity,
        }
    }

    fn build(config: &Config, identity: Arc<RuntimeIdentity>) -> Result<Option<Pipeline>, MonitorError> {
        let required = config.activation.required_runner.as_deref();
        if !identity.matches_runner(required) {
            tracing::info!(
                "Process '{}' is not the configured runner '{}'; testmonitor stays inactive",
                identity.process_name,
                required.unwrap_or_default()
            );
            return Ok(None);
        }

        let emitter = Emitter::from_config(config, Arc::clone(&identity))?;
        announce(config, &identity);

        Ok(Some(Pipeline {
            translator: Translator::new(identity),
            emitter,
        }))
    }

    pub fn is_active(&self) -> bool {
        self.pipeline
            .as_ref()
            .is_some_and(|p| p.emitter.is_open())
    }

    pub fn identity(&self) -> &RuntimeIdentity {
        &self.identity
    }

    /// Handle one raw fragment. Never fails and never panics into the host.
    pub fn on_test_event(&self, fragment: &str) {
        let Some(pipeline) = &self.pipeline else {
            return;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| pipeline.handle(fragment)));
        if outcome.is_err() {
            tracing::error!(operation = "on_test_event", "Panic while handling fragment");
        }
    }

    /// Release every sink now instead of waiting for the run report.
    pub fn shutdown(&self) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.emitter.close();
        }
    }
}

impl Pipeline {
    fn handle(&self, fragment: &str) {
        let events = match self.translator.translate(fragment) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(operation = "translate", error = %e, "Dropping fragment");
                return;
            }
        };

        for event in events {
            let kind = event.kind();
            if let Delivery::Closed = self.emitter.publish(event) {
                tracing::debug!(event = %kind, "Fragment arrived after the run report");
            }
        }
    }
}

fn announce(config: &Config, identity: &RuntimeIdentity) {
    if config.emit.sinks.contains(SinkKind::Console) {
        announce_on(&mut ConsoleSink::new(config.emit.output_stream), identity);
    } else {
        tracing::info!("{}", identity.activation_message());
    }
}

/// The banner shares the console summaries' target.
fn announce_on(console: &mut ConsoleSink, identity: &RuntimeIdentity) {
    if let Err(e) = console.write_line(&identity.activation_message()) {
        tracing::warn!(operation = "announce", error = %e, "Could not write activation message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputStream, SinkSet};
    use std::io::{self, Write};
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.emit.sinks = SinkSet::empty();
        config
    }

    #[test]
    fn test_runner_gate_leaves_monitor_inert() {
        let mut config = quiet_config();
        config.activation.required_runner = Some("nunit3-console".to_string());

        let monitor = TestMonitor::activate(&config, RuntimeIdentity::fixed(Uuid::nil(), "cargo"));
        assert!(!monitor.is_active());
        monitor.on_test_event(r#"<test-case id="1" result="Passed"/>"#);
    }

    #[test]
    fn test_matching_runner_activates() {
        let mut config = quiet_config();
        config.activation.required_runner = Some("NUnit3-Console.exe".to_string());

        let monitor = TestMonitor::try_activate(
            &config,
            RuntimeIdentity::fixed(Uuid::nil(), "nunit3-console"),
        )
        .expect("activate");
        assert!(monitor.is_active());

        monitor.on_test_event("not markup at all");
        monitor.on_test_event(r#"<test-run id="1" total="0" result="Passed"/>"#);
        assert!(!monitor.is_active());
    }

    #[test]
    fn test_shutdown_deactivates() {
        let monitor = TestMonitor::activate(&quiet_config(), RuntimeIdentity::fixed(Uuid::nil(), "runner"));
        assert!(monitor.is_active());
        monitor.shutdown();
        assert!(!monitor.is_active());
    }

    #[test]
    fn test_banner_goes_to_console_target() {
        let identity = RuntimeIdentity::fixed(Uuid::nil(), "runner");
        let captured = Captured::default();
        announce_on(&mut ConsoleSink::with_writer(Box::new(captured.clone())), &identity);

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).expect("utf8");
        assert_eq!(output, format!("{}\n", identity.activation_message()));
    }

    #[test]
    fn test_activation_with_silent_console() {
        let mut config = quiet_config();
        config.emit.sinks = SinkSet::from_iter([SinkKind::Console]);
        config.emit.output_stream = OutputStream::None;

        let monitor = TestMonitor::try_activate(&config, RuntimeIdentity::fixed(Uuid::nil(), "runner"))
            .expect("activate");
        assert!(monitor.is_active());
    }
}
