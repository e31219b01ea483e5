use serde::{Deserialize, Serialize};

/// Configuration for the built-in shell-exec tool runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub exec: ExecConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            exec: ExecConfig::default(),
        }
    }
}

/// Tuning for `exec`: how long to wait in the foreground before
/// auto-backgrounding, how long a backgrounded process may run, and how
/// much output to retain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Milliseconds to wait for the command to finish before moving it to
    /// the background and returning a session id.
    #[serde(default = "d_10000")]
    pub background_ms: u64,
    /// Maximum lifetime of a backgrounded process before it is killed.
    #[serde(default = "d_1800")]
    pub timeout_sec: u64,
    /// How long a finished session's output is kept before `cleanup_stale`
    /// removes it.
    #[serde(default = "d_1800000")]
    pub cleanup_ms: u64,
    /// Maximum combined stdout+stderr characters retained per session.
    #[serde(default = "d_1000000")]
    pub max_output_chars: usize,
    /// Maximum characters returned in a single poll/foreground response.
    #[serde(default = "d_500000")]
    pub pending_max_output_chars: usize,
    /// Emit a tool notification when a backgrounded process exits.
    #[serde(default = "d_true")]
    pub notify_on_exit: bool,
    /// Still notify when the process exited 0 with empty output.
    #[serde(default)]
    pub notify_on_exit_empty_success: bool,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            background_ms: d_10000(),
            timeout_sec: d_1800(),
            cleanup_ms: d_1800000(),
            max_output_chars: d_1000000(),
            pending_max_output_chars: d_500000(),
            notify_on_exit: d_true(),
            notify_on_exit_empty_success: false,
        }
    }
}

fn d_10000() -> u64 {
    10_000
}
fn d_1800() -> u64 {
    1800
}
fn d_1800000() -> u64 {
    1_800_000
}
fn d_1000000() -> usize {
    1_000_000
}
fn d_500000() -> usize {
    500_000
}
fn d_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_teacher_values() {
        let c = ExecConfig::default();
        assert_eq!(c.background_ms, 10_000);
        assert_eq!(c.timeout_sec, 1800);
        assert_eq!(c.cleanup_ms, 1_800_000);
        assert_eq!(c.max_output_chars, 1_000_000);
        assert_eq!(c.pending_max_output_chars, 500_000);
        assert!(c.notify_on_exit);
        assert!(!c.notify_on_exit_empty_success);
    }

    #[test]
    fn deserializes_from_partial_toml() {
        let c: ToolsConfig = toml::from_str("[exec]\ntimeout_sec = 60\n").unwrap();
        assert_eq!(c.exec.timeout_sec, 60);
        assert_eq!(c.exec.background_ms, 10_000);
    }
}
