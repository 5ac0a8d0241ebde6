use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;

use crate::command::{build_command, PROGRESS_MARKER};
use crate::error::{Error, Result};
use crate::runner::ProcessRunner;
use crate::types::{DownloadEvent, DownloadProgress, ProcessOutcome};

#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
    env_vars: HashMap<String, String>
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlp {
    pub fn new() -> Self {
        Self::with_binary("yt-dlp")
    }

    pub fn with_binary(path: impl Into<PathBuf>) -> Self {
        Self {
            binary: path.into(),
            env_vars: HashMap::new()
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn set_env(&mut self, key: String, value: String) {
        self.env_vars.insert(key, value);
    }

    pub async fn check_binary(&self) -> Result<String> {
        let output = build_command(&self.binary, &["--version".to_string()], &self.env_vars)
            .output()
            .await
            .map_err(Error::ExecutionFailed)?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(Error::BinaryNotExecutable(self.binary.clone()))
        }
    }
}

#[async_trait]
impl ProcessRunner for YtDlp {
    async fn run(&self, args: Vec<String>, limit: Duration, label: &str) -> ProcessOutcome {
        tracing::debug!(
            binary = %self.binary.display(),
            args = ?args,
            strategy = label,
            "spawning yt-dlp"
        );

        let mut cmd = build_command(&self.binary, &args, &self.env_vars);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(strategy = label, "failed to spawn yt-dlp: {}", e);
                return ProcessOutcome::SpawnError(e.to_string());
            }
        };

        let mut stderr_task = child.stderr.take().map(|stderr| tokio::spawn(collect_stderr(stderr)));
        let Some(stdout) = child.stdout.take() else {
            return ProcessOutcome::SpawnError("stdout not captured".to_string());
        };

        // Helpers spawned by yt-dlp can keep stderr open after it exits, so
        // the stderr join shares the deadline.
        let finished = tokio::time::timeout(limit, async {
            let (status, stdout) = drain_and_wait(&mut child, stdout, label).await?;
            let stderr = join_stderr(stderr_task.as_mut()).await;
            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await;

        match finished {
            Ok(Ok((status, stdout, stderr))) => {
                if status.success() {
                    ProcessOutcome::Success { stdout }
                } else {
                    ProcessOutcome::ExitFailure {
                        code: status.code().unwrap_or(-1),
                        stderr
                    }
                }
            }
            Ok(Err(e)) => {
                kill_child(&mut child, label).await;
                abort_stderr(stderr_task);
                ProcessOutcome::SpawnError(e.to_string())
            }
            Err(_) => {
                tracing::warn!(strategy = label, "yt-dlp exceeded {}s, killing it", limit.as_secs());
                kill_child(&mut child, label).await;
                abort_stderr(stderr_task);
                ProcessOutcome::TimedOut(limit)
            }
        }
    }
}

async fn drain_and_wait<R>(
    child: &mut Child,
    stdout: R,
    label: &str
) -> std::io::Result<(ExitStatus, String)>
where
    R: AsyncRead + Unpin
{
    let mut reader = BufReader::new(stdout).lines();
    let mut collected = String::new();

    while let Some(line) = reader.next_line().await? {
        tracing::trace!(line = %line, "yt-dlp stdout");
        match parse_progress_line(&line) {
            Some(event) => log_event(label, &event),
            None => {
                collected.push_str(&line);
                collected.push('\n');
            }
        }
    }

    let status = child.wait().await?;
    Ok((status, collected))
}

async fn collect_stderr<R>(stderr: R) -> String
where
    R: AsyncRead + Unpin
{
    let mut reader = BufReader::new(stderr).lines();
    let mut collected = String::new();
    while let Ok(Some(line)) = reader.next_line().await {
        tracing::trace!(line = %line, "yt-dlp stderr");
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

async fn join_stderr(task: Option<&mut JoinHandle<String>>) -> String {
    match task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new()
    }
}

fn abort_stderr(task: Option<JoinHandle<String>>) {
    if let Some(task) = task {
        task.abort();
    }
}

async fn kill_child(child: &mut Child, label: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!(strategy = label, "failed to kill yt-dlp: {}", e);
    }
}

fn log_event(label: &str, event: &DownloadEvent) {
    match event {
        DownloadEvent::Destination { filename } => {
            tracing::info!(strategy = label, "download started: {}", filename);
        }
        DownloadEvent::Progress(progress) => {
            tracing::debug!(
                strategy = label,
                percent = progress.percent.unwrap_or(0.0),
                total = progress.format_total().as_deref().unwrap_or("unknown size"),
                speed = progress.format_speed().as_deref().unwrap_or("-"),
                eta = progress.format_eta().as_deref().unwrap_or("-"),
                "download progress"
            );
        }
        DownloadEvent::Merging { filename } => {
            tracing::info!(strategy = label, into = ?filename, "merging formats");
        }
        DownloadEvent::PostProcessing { status } => {
            tracing::info!(strategy = label, "post-processing: {}", status);
        }
        DownloadEvent::AlreadyDownloaded => {
            tracing::debug!(strategy = label, "file already downloaded");
        }
        DownloadEvent::Warning { message } => {
            tracing::warn!(strategy = label, "yt-dlp warning: {}", message);
        }
        DownloadEvent::Error { message } => {
            tracing::warn!(strategy = label, "yt-dlp error: {}", message);
        }
    }
}

fn parse_progress_line(line: &str) -> Option<DownloadEvent> {
    let line = line.trim();

    if let Some(filename) = line.strip_prefix("[download] Destination:") {
        return Some(DownloadEvent::Destination {
            filename: filename.trim().to_string()
        });
    }

    if let Some(rest) = line.strip_prefix(PROGRESS_MARKER) {
        return parse_template_progress(rest).map(DownloadEvent::Progress);
    }

    if line.starts_with("[download]") {
        if line.contains("has already been downloaded") {
            return Some(DownloadEvent::AlreadyDownloaded);
        }
        if line.contains('%') {
            return parse_bracket_progress(line).map(DownloadEvent::Progress);
        }
        return None;
    }

    if line.starts_with("[Merger]") {
        let filename = line
            .find('"')
            .zip(line.rfind('"'))
            .filter(|(start, end)| end > start)
            .map(|(start, end)| line[start + 1..end].to_string());
        return Some(DownloadEvent::Merging { filename });
    }

    if line.starts_with("[ExtractAudio]") || line.starts_with("[ffmpeg]") || line.starts_with("[VideoConvertor]") {
        return Some(DownloadEvent::PostProcessing {
            status: line.to_string()
        });
    }

    if let Some(message) = line.strip_prefix("WARNING:") {
        return Some(DownloadEvent::Warning {
            message: message.trim().to_string()
        });
    }

    if let Some(message) = line.strip_prefix("ERROR:") {
        return Some(DownloadEvent::Error {
            message: message.trim().to_string()
        });
    }

    None
}

/// Lines produced by [`crate::PROGRESS_TEMPLATE`] after the marker:
/// percent, total, speed, eta.
fn parse_template_progress(content: &str) -> Option<DownloadProgress> {
    let mut parts = content.split_whitespace();
    let percent = parse_percent(parts.next()?);
    Some(DownloadProgress {
        percent,
        total_bytes: parts.next().and_then(parse_size),
        speed: parts.next().and_then(parse_speed),
        eta: parts.next().and_then(parse_eta)
    })
}

/// Default layout: `[download]  45.2% of ~10.00MiB at 1.00MiB/s ETA 00:05`.
fn parse_bracket_progress(line: &str) -> Option<DownloadProgress> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let percent = parts.iter().find(|p| p.ends_with('%')).and_then(|p| parse_percent(p))?;

    let after = |keyword: &str| {
        parts
            .iter()
            .position(|p| *p == keyword)
            .and_then(|i| parts.get(i + 1).copied())
    };

    Some(DownloadProgress {
        percent: Some(percent),
        total_bytes: after("of").and_then(parse_size),
        speed: after("at").and_then(parse_speed),
        eta: after("ETA").and_then(parse_eta)
    })
}

fn parse_percent(s: &str) -> Option<f64> {
    s.trim().trim_end_matches('%').parse().ok()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_size(s: &str) -> Option<u64> {
    const UNITS: [(&str, f64); 7] = [
        ("GiB", 1_073_741_824.0),
        ("MiB", 1_048_576.0),
        ("KiB", 1_024.0),
        ("GB", 1_000_000_000.0),
        ("MB", 1_000_000.0),
        ("KB", 1_000.0),
        ("B", 1.0)
    ];

    let s = s.trim().trim_start_matches('~');
    UNITS.iter().find_map(|(suffix, mult)| {
        let num: f64 = s.strip_suffix(suffix)?.trim().parse().ok()?;
        Some((num * mult) as u64)
    })
}

#[allow(clippy::cast_precision_loss)]
fn parse_speed(s: &str) -> Option<f64> {
    parse_size(s.trim().strip_suffix("/s")?).map(|b| b as f64)
}

fn parse_eta(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.split(':').count() > 3 {
        return None;
    }
    s.split(':')
        .try_fold(0.0, |acc, part| Some(acc * 60.0 + part.parse::<f64>().ok()?))
}
