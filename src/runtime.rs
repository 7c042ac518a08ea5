// Runtime identity of the observed process

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identity stamped onto every published event.
///
/// Built once at startup and shared by the translator and the emitter, so every
/// sink sees the same run id and process fields for the lifetime of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeIdentity {
    pub run_id: Uuid,
    pub process_name: String,
    pub process_id: u32,
    pub process_session: u32,
    pub process_start_time: DateTime<Utc>,
    pub runtime: String,
    pub runtime_version: String,
}

impl RuntimeIdentity {
    /// Inspect the current process
    pub fn detect() -> Self {
        let process_name = std::env::current_exe()
            .ok()
            .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| String::from("unknown"));

        Self {
            run_id: Uuid::new_v4(),
            process_name,
            process_id: std::process::id(),
            process_session: process_session(),
            process_start_time: Utc::now(),
            runtime: String::from("native"),
            runtime_version: format!(
                "{} {} ({}-{})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
        }
    }

    /// Identity with fixed values, for fixtures and replays
    pub fn fixed(run_id: Uuid, process_name: impl Into<String>) -> Self {
        Self {
            run_id,
            process_name: process_name.into(),
            process_id: 0,
            process_session: 0,
            process_start_time: DateTime::default(),
            runtime: String::from("native"),
            runtime_version: String::new(),
        }
    }

    pub fn with_runtime(mut self, runtime: impl Into<String>, version: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self.runtime_version = version.into();
        self
    }

    /// Whether this process is the runner the monitor was configured for.
    ///
    /// `None` accepts any process. Names compare case-insensitively and an
    /// executable suffix on either side is ignored.
    pub fn matches_runner(&self, required: Option<&str>) -> bool {
        let Some(required) = required.map(str::trim).filter(|r| !r.is_empty()) else {
            return true;
        };

        let strip = |name: &str| -> String {
            let lower = name.to_ascii_lowercase();
            lower
                .strip_suffix(".exe")
                .map(str::to_string)
                .unwrap_or(lower)
        };

        strip(&self.process_name) == strip(required)
    }

    pub fn activation_message(&self) -> String {
        format!(
            "testmonitor activated for run '{}'. ProcessInfo: {}|{}|{}|{}|{} {}",
            self.run_id,
            self.process_name,
            self.process_id,
            self.process_session,
            self.process_start_time.to_rfc3339(),
            self.runtime,
            self.runtime_version
        )
    }
}

#[cfg(target_os = "linux")]
fn process_session() -> u32 {
    // Field 6 of /proc/self/stat; the command name in field 2 may contain spaces.
    std::fs::read_to_string("/proc/self/stat")
        .ok()
        .and_then(|stat| {
            let rest = stat.rsplit_once(')')?.1;
            rest.split_whitespace().nth(3)?.parse().ok()
        })
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn process_session() -> u32 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_uses_current_process() {
        let identity = RuntimeIdentity::detect();
        assert_eq!(identity.process_id, std::process::id());
        assert!(!identity.process_name.is_empty());
        assert!(!identity.run_id.is_nil());
    }

    #[test]
    fn test_detect_generates_distinct_run_ids() {
        assert_ne!(
            RuntimeIdentity::detect().run_id,
            RuntimeIdentity::detect().run_id
        );
    }

    #[test]
    fn test_matches_runner() {
        let identity = RuntimeIdentity::fixed(Uuid::nil(), "nunit3-console.exe");
        assert!(identity.matches_runner(None));
        assert!(identity.matches_runner(Some("")));
        assert!(identity.matches_runner(Some("NUnit3-Console")));
        assert!(identity.matches_runner(Some("nunit3-console.exe")));
        assert!(!identity.matches_runner(Some("devenv")));
    }

    #[test]
    fn test_activation_message_contains_run_id() {
        let run_id = Uuid::new_v4();
        let identity = RuntimeIdentity::fixed(run_id, "runner");
        let message = identity.activation_message();
        assert!(message.contains(&run_id.to_string()));
        assert!(message.contains("runner"));
    }
}
