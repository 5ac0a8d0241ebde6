mod outcome;
mod progress;
mod video_info;

pub use outcome::ProcessOutcome;
pub use progress::{DownloadEvent, DownloadProgress};
pub use video_info::{Format, Thumbnail, VideoInfo};
