//! Scripted stand-in for the yt-dlp process.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use yt_dlp::{ProcessOutcome, ProcessRunner};

pub struct Step {
    outcome: ProcessOutcome,
    writes: Vec<&'static str>
}

impl Step {
    pub fn ok(stdout: &str) -> Self {
        Self {
            outcome: ProcessOutcome::Success {
                stdout: stdout.to_string()
            },
            writes: Vec::new()
        }
    }

    pub fn fail(stderr: &str) -> Self {
        Self {
            outcome: ProcessOutcome::ExitFailure {
                code: 1,
                stderr: stderr.to_string()
            },
            writes: Vec::new()
        }
    }

    pub fn timeout() -> Self {
        Self {
            outcome: ProcessOutcome::TimedOut(Duration::from_secs(1)),
            writes: Vec::new()
        }
    }

    /// Files to create next to the `-o` template, e.g. `.f137.mp4`.
    pub fn writes(mut self, suffixes: &[&'static str]) -> Self {
        self.writes.extend_from_slice(suffixes);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub args: Vec<String>,
    pub label: String,
    /// Whether the `--cookies` file existed while this attempt ran.
    pub cookie_file_present: Option<bool>
}

#[derive(Default)]
pub struct ScriptedRunner {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Call>>
}

impl ScriptedRunner {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new())
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.label).collect()
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let idx = args.iter().position(|arg| arg == flag)?;
    args.get(idx + 1).map(String::as_str)
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, args: Vec<String>, _limit: Duration, label: &str) -> ProcessOutcome {
        let cookie_file_present = value_after(&args, "--cookies").map(|path| Path::new(path).exists());
        let step = self.steps.lock().unwrap().pop_front();

        if let (Some(step), Some(template)) = (&step, value_after(&args, "-o")) {
            let stem = template.trim_end_matches(".%(ext)s");
            for suffix in &step.writes {
                std::fs::write(format!("{stem}{suffix}"), b"media bytes").unwrap();
            }
        }

        self.calls.lock().unwrap().push(Call {
            args,
            label: label.to_string(),
            cookie_file_present
        });

        match step {
            Some(step) => step.outcome,
            None => ProcessOutcome::ExitFailure {
                code: 1,
                stderr: "ERROR: no scripted outcome left".to_string()
            }
        }
    }
}
