use std::time::Duration;

/// How a single script execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Natural exit with the given code
    Exited(i32),

    /// Deadline elapsed and the process was killed
    TimedOut,

    /// Started but ended abnormally (signal, failed wait, aborted pipeline)
    Failed(String),

    /// The process was never spawned
    NotStarted(String),
}

/// Result of one script in one gather cycle.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub script: String,
    pub termination: Termination,
    pub stdout: Vec<u8>,
    /// Only populated on a non-zero exit.
    pub stderr: Vec<u8>,
    pub duration: Duration,
}

impl ExecutionOutcome {
    /// 0 on clean exit, -1 on timeout or unknown failure, `None` when the
    /// process never started.
    pub fn exit_code(&self) -> Option<i32> {
        match &self.termination {
            Termination::Exited(code) => Some(*code),
            Termination::TimedOut | Termination::Failed(_) => Some(-1),
            Termination::NotStarted(_) => None,
        }
    }

    pub fn start_error(&self) -> Option<&str> {
        match &self.termination {
            Termination::NotStarted(message) => Some(message),
            _ => None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.termination == Termination::Exited(0)
    }

    pub fn timed_out(&self) -> bool {
        self.termination == Termination::TimedOut
    }

    /// Stdout that is safe to parse. Timeouts and abnormal endings leave
    /// partial output, which is never handed out.
    pub fn parseable_output(&self) -> Option<&[u8]> {
        match self.termination {
            Termination::Exited(_) => Some(&self.stdout),
            _ => None,
        }
    }

    pub fn stderr_text(&self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.stderr);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(termination: Termination) -> ExecutionOutcome {
        ExecutionOutcome {
            script: "test".to_string(),
            termination,
            stdout: b"foo 1\n".to_vec(),
            stderr: Vec::new(),
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_exit_code_classification() {
        assert_eq!(outcome(Termination::Exited(0)).exit_code(), Some(0));
        assert_eq!(outcome(Termination::Exited(3)).exit_code(), Some(3));
        assert_eq!(outcome(Termination::TimedOut).exit_code(), Some(-1));
        assert_eq!(outcome(Termination::Failed("signal 9".into())).exit_code(), Some(-1));

        let not_started = outcome(Termination::NotStarted("no such file".into()));
        assert_eq!(not_started.exit_code(), None);
        assert_eq!(not_started.start_error(), Some("no such file"));
    }

    #[test]
    fn test_only_natural_exits_are_parseable() {
        assert!(outcome(Termination::Exited(0)).parseable_output().is_some());
        assert!(outcome(Termination::Exited(1)).parseable_output().is_some());
        assert!(outcome(Termination::TimedOut).parseable_output().is_none());
        assert!(outcome(Termination::Failed("x".into())).parseable_output().is_none());
    }

    #[test]
    fn test_success_requires_zero_exit() {
        assert!(outcome(Termination::Exited(0)).succeeded());
        assert!(!outcome(Termination::Exited(2)).succeeded());
        assert!(!outcome(Termination::TimedOut).succeeded());
    }

    #[test]
    fn test_stderr_text_ignores_blank_output() {
        let mut failed = outcome(Termination::Exited(1));
        failed.stderr = b"  \n".to_vec();
        assert_eq!(failed.stderr_text(), None);

        failed.stderr = b"boom\n".to_vec();
        assert_eq!(failed.stderr_text().as_deref(), Some("boom"));
    }
}
