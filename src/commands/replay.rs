// Replay command - drive the monitor from recorded fragments

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use tracing::info;

use crate::cli::args::ReplayArgs;
use crate::config::Config;
use crate::monitor::TestMonitor;
use crate::runtime::RuntimeIdentity;

pub fn handle_replay(config: &Config, args: &ReplayArgs) -> Result<()> {
    let mut config = config.clone();
    if let Some(format) = args.format {
        config.emit.format = format;
    }
    if let Some(path) = &args.log_file {
        config.log.file = path.clone();
    }

    let mut identity = RuntimeIdentity::detect();
    if let Some(name) = &args.as_runner {
        identity.process_name = name.clone();
    }

    let monitor = TestMonitor::try_activate(&config, identity).context("failed to activate testmonitor")?;
    if !monitor.is_active() {
        info!("Monitor is inactive for this process; fragments will be ignored");
    }

    let reader: Box<dyn BufRead> = match &args.file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let replayed = replay(&monitor, reader)?;
    monitor.shutdown();
    info!("Replayed {} fragments", replayed);
    Ok(())
}

/// Feed one fragment per non-empty line to the monitor.
pub fn replay(monitor: &TestMonitor, reader: impl BufRead) -> Result<usize> {
    let mut replayed = 0;
    for line in reader.lines() {
        let line = line.context("failed to read fragment")?;
        let fragment = line.trim();
        if fragment.is_empty() {
            continue;
        }
        monitor.on_test_event(fragment);
        replayed += 1;
    }
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SinkKind, SinkSet};
    use std::io::Cursor;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[test]
    fn test_replay_writes_log_records() {
        let dir = TempDir::new().expect("tempdir");
        let log = dir.path().join("events.log");

        let mut config = Config::default();
        config.emit.sinks = SinkSet::from_iter([SinkKind::LogFile]);
        config.log.file = log.clone();

        let monitor = TestMonitor::try_activate(&config, RuntimeIdentity::fixed(Uuid::nil(), "runner"))
            .expect("activate");

        let input = concat!(
            "<start-run count=\"1\"/>\n",
            "\n",
            "<start-test id=\"1\" name=\"T1\"/>\n",
            "<test-case id=\"1\" name=\"T1\" result=\"Passed\"/>\n",
        );
        let replayed = replay(&monitor, Cursor::new(input)).expect("replay");
        assert_eq!(replayed, 3);

        let content = std::fs::read_to_string(&log).expect("read log");
        assert_eq!(content.lines().count(), 3);
        assert!(content.lines().all(|l| l.contains("\"TestRunId\":\"00000000-0000-0000-0000-000000000000\"")));
    }
}
