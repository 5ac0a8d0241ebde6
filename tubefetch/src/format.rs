use yt_dlp::CommandBuilder;

use crate::error::FetchError;

const BEST_VIDEO_SELECTOR: &str =
    "bestvideo[vcodec^=avc]+bestaudio[ext=m4a]/best[ext=mp4][vcodec^=avc]/best[ext=mp4]/best";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio
}

impl MediaKind {
    pub fn parse(value: &str) -> Result<Self, FetchError> {
        match value {
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            _ => Err(FetchError::Validation(
                "Invalid format. Must be \"video\" or \"audio\"".to_string()
            ))
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3"
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            MediaKind::Video => "video/mp4",
            MediaKind::Audio => "audio/mpeg"
        }
    }
}

/// A validated quality token: `best`, `<height>p` or `<bitrate>kbps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Best,
    Height(u32),
    Bitrate(u32)
}

impl Quality {
    /// Accepts `best`, a height label such as `720p` or `1080p60`, or an
    /// audio bitrate such as `160kbps`.
    pub fn parse(kind: MediaKind, token: &str) -> Result<Self, FetchError> {
        let token = token.trim();
        if token.eq_ignore_ascii_case("best") {
            return Ok(Quality::Best);
        }

        let parsed = split_number(token).and_then(|(value, rest)| match kind {
            MediaKind::Video if rest.starts_with('p') => Some(Quality::Height(value)),
            MediaKind::Audio if rest.is_empty() || rest.eq_ignore_ascii_case("kbps") || rest.eq_ignore_ascii_case("k") => {
                Some(Quality::Bitrate(value))
            }
            _ => None
        });

        parsed.ok_or_else(|| FetchError::Validation(format!("Invalid quality: {token}")))
    }
}

/// Splits a positive leading integer from the rest of the token.
fn split_number(token: &str) -> Option<(u32, &str)> {
    let end = token.find(|c: char| !c.is_ascii_digit()).unwrap_or(token.len());
    let value = token[..end].parse::<u32>().ok().filter(|n| *n > 0)?;
    Some((value, &token[end..]))
}

/// The `-f` expression handed to the engine. Fallbacks are encoded in the
/// expression itself and evaluated by yt-dlp.
pub fn format_selector(kind: MediaKind, quality: Quality) -> String {
    match (kind, quality) {
        (MediaKind::Audio, _) => "bestaudio".to_string(),
        (MediaKind::Video, Quality::Height(h)) => format!(
            "bestvideo[height={h}][vcodec^=avc]+bestaudio[ext=m4a]/bestvideo[height={h}]+bestaudio/best[height={h}]"
        ),
        (MediaKind::Video, _) => BEST_VIDEO_SELECTOR.to_string()
    }
}

/// Appends format selection and the matching post-processing flags.
pub fn apply_selection(builder: CommandBuilder, kind: MediaKind, quality: Quality) -> CommandBuilder {
    let builder = builder.format(format_selector(kind, quality));
    match kind {
        MediaKind::Video => builder.merge_output_format("mp4"),
        MediaKind::Audio => builder
            .extract_audio()
            .audio_format("mp3")
            .audio_quality("0")
    }
}
