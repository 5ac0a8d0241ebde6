//! Async Rust wrapper for the yt-dlp CLI.
//!
//! Arguments are assembled with [`CommandBuilder`] and executed through the
//! [`ProcessRunner`] trait. [`YtDlp`] is the real runner: it spawns the
//! binary, logs progress through `tracing`, enforces a deadline and resolves
//! to a [`ProcessOutcome`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use yt_dlp::{CommandBuilder, ProcessRunner, VideoInfo, YtDlp};
//!
//! #[tokio::main]
//! async fn main() -> yt_dlp::Result<()> {
//!     let client = YtDlp::new();
//!     println!("yt-dlp version: {}", client.check_binary().await?);
//!
//!     let args = CommandBuilder::new()
//!         .url("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
//!         .json_output()
//!         .no_playlist()
//!         .into_args();
//!
//!     let outcome = client.run(args, Duration::from_secs(60), "none").await;
//!     if let yt_dlp::ProcessOutcome::Success { stdout } = outcome {
//!         let info: VideoInfo = serde_json::from_str(&stdout)?;
//!         println!("Title: {:?}", info.title);
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod command;
pub mod error;
mod runner;
pub mod types;

pub use client::YtDlp;
pub use command::{CommandBuilder, PROGRESS_TEMPLATE};
pub use error::{Error, Result};
pub use runner::ProcessRunner;
pub use types::*;
