use std::time::Duration;

/// How one engine invocation ended. Runners never return `Err`; every
/// termination path lands in one of these variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Success { stdout: String },
    ExitFailure { code: i32, stderr: String },
    SpawnError(String),
    TimedOut(Duration)
}

impl ProcessOutcome {
    /// Diagnostic text suitable for classification and logging.
    pub fn message(&self) -> String {
        match self {
            ProcessOutcome::Success { .. } => String::new(),
            ProcessOutcome::ExitFailure { code, stderr } => {
                let detail = error_lines(stderr);
                if detail.is_empty() {
                    format!("Process exited with code {code}")
                } else {
                    detail
                }
            }
            ProcessOutcome::SpawnError(cause) => format!("failed to execute yt-dlp: {cause}"),
            ProcessOutcome::TimedOut(limit) => {
                format!("yt-dlp did not finish within {}s", limit.as_secs())
            }
        }
    }
}

/// Keeps `ERROR:` lines when present, otherwise the trimmed stderr.
fn error_lines(stderr: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("ERROR:"))
        .collect();

    if errors.is_empty() {
        stderr.trim().to_string()
    } else {
        errors.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_prefers_error_lines() {
        let outcome = ProcessOutcome::ExitFailure {
            code: 1,
            stderr: "WARNING: something odd\nERROR: [youtube] abc: Private video\n".to_string()
        };
        assert_eq!(outcome.message(), "ERROR: [youtube] abc: Private video");
    }

    #[test]
    fn test_message_without_stderr() {
        let outcome = ProcessOutcome::ExitFailure {
            code: 2,
            stderr: "  \n".to_string()
        };
        assert_eq!(outcome.message(), "Process exited with code 2");
    }

    #[test]
    fn test_message_timeout() {
        let outcome = ProcessOutcome::TimedOut(Duration::from_secs(30));
        assert_eq!(outcome.message(), "yt-dlp did not finish within 30s");
    }
}
