//! Metadata lookup and the quality menu shown to users.

use std::time::Duration;

use serde::Serialize;
use yt_dlp::{CommandBuilder, Format, ProcessRunner, VideoInfo};

use crate::credentials::CredentialChain;
use crate::error::FetchError;

const MAX_AUDIO_OPTIONS: usize = 4;
const DEFAULT_AUDIO_BITRATE: f64 = 128.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoOption {
    pub quality: String,
    pub format_id: String,
    pub height: u32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioOption {
    pub bitrate: u32,
    pub format_id: String
}

#[derive(Debug, Clone, Serialize)]
pub struct FormatOptions {
    pub video: Vec<VideoOption>,
    pub audio: Vec<AudioOption>
}

/// Body of `GET /api/video/info`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail: String,
    pub duration: String,
    pub channel: String,
    pub view_count: u64,
    pub formats: FormatOptions
}

impl VideoMetadata {
    pub fn from_info(info: &VideoInfo) -> Self {
        Self {
            title: info
                .title
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            thumbnail: info.best_thumbnail().unwrap_or_default().to_string(),
            duration: format_duration(info.duration_seconds()),
            channel: info.channel_name().unwrap_or("Unknown").to_string(),
            view_count: info.view_count.unwrap_or(0),
            formats: FormatOptions {
                video: video_options(&info.formats),
                audio: audio_options(&info.formats)
            }
        }
    }
}

/// Runs yt-dlp in metadata mode through the credential chain.
pub async fn fetch_info(
    runner: &dyn ProcessRunner,
    chain: &CredentialChain,
    url: &str,
    limit: Duration
) -> Result<VideoInfo, FetchError> {
    let base = CommandBuilder::new()
        .url(url)
        .json_output()
        .no_playlist()
        .no_warnings();

    let stdout = chain.run(runner, &base, limit).await?;
    let info: VideoInfo = serde_json::from_str(stdout.trim())?;
    tracing::info!(id = ?info.id, title = ?info.title, formats = info.formats.len(), "fetched video info");
    Ok(info)
}

fn default_video_options() -> Vec<VideoOption> {
    vec![
        VideoOption {
            quality: "720p".to_string(),
            format_id: "22".to_string(),
            height: 720
        },
        VideoOption {
            quality: "360p".to_string(),
            format_id: "18".to_string(),
            height: 360
        },
    ]
}

fn default_audio_options() -> Vec<AudioOption> {
    vec![AudioOption {
        bitrate: 128,
        format_id: "140".to_string()
    }]
}

/// Leading decimal digits of a label like `1080p60`.
fn leading_number(label: &str) -> Option<u32> {
    let end = label.find(|c: char| !c.is_ascii_digit()).unwrap_or(label.len());
    label[..end].parse::<u32>().ok().filter(|n| *n > 0)
}

/// One entry per quality label, tallest first. Video-only streams count
/// since downloads merge in the best audio.
pub fn video_options(formats: &[Format]) -> Vec<VideoOption> {
    let mut options: Vec<VideoOption> = Vec::new();

    for format in formats {
        if !format.has_video() || !matches!(format.ext.as_deref(), Some("mp4" | "webm")) {
            continue;
        }

        let quality = match (&format.format_note, format.height) {
            (Some(note), _) if !note.is_empty() => note.clone(),
            (_, Some(height)) => format!("{height}p"),
            _ => continue
        };
        let Some(label_height) = leading_number(&quality) else {
            continue;
        };
        if options.iter().any(|o| o.quality == quality) {
            continue;
        }

        options.push(VideoOption {
            quality,
            format_id: format.format_id.clone(),
            height: format.height.unwrap_or(label_height)
        });
    }

    if options.is_empty() {
        return default_video_options();
    }
    options.sort_by(|a, b| b.height.cmp(&a.height));
    options
}

/// Audio-only streams, one per rounded bitrate, highest first, at most four.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn audio_options(formats: &[Format]) -> Vec<AudioOption> {
    let mut options: Vec<AudioOption> = Vec::new();

    for format in formats.iter().filter(|f| f.has_audio() && !f.has_video()) {
        let bitrate = format.audio_bitrate().unwrap_or(DEFAULT_AUDIO_BITRATE).round() as u32;
        if options.iter().any(|o| o.bitrate == bitrate) {
            continue;
        }
        options.push(AudioOption {
            bitrate,
            format_id: format.format_id.clone()
        });
    }

    if options.is_empty() {
        return default_audio_options();
    }
    options.sort_by(|a, b| b.bitrate.cmp(&a.bitrate));
    options.truncate(MAX_AUDIO_OPTIONS);
    options
}

/// `M:SS` under an hour, `H:MM:SS` otherwise.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedRunner, Step};

    fn video(id: &str, ext: &str, height: Option<u32>, note: Option<&str>) -> Format {
        Format {
            format_id: id.to_string(),
            ext: Some(ext.to_string()),
            height,
            format_note: note.map(String::from),
            vcodec: Some("avc1.640028".to_string()),
            acodec: Some("none".to_string()),
            ..Format::default()
        }
    }

    fn audio(id: &str, abr: Option<f64>, tbr: Option<f64>) -> Format {
        Format {
            format_id: id.to_string(),
            ext: Some("m4a".to_string()),
            vcodec: Some("none".to_string()),
            acodec: Some("mp4a.40.2".to_string()),
            abr,
            tbr,
            ..Format::default()
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(45), "0:45");
        assert_eq!(format_duration(125), "2:05");
        assert_eq!(format_duration(3661), "1:01:01");
    }

    #[test]
    fn test_video_options_filter_dedupe_and_sort() {
        let formats = vec![
            video("160", "mp4", Some(144), Some("144p")),
            video("137", "mp4", Some(1080), Some("1080p")),
            video("248", "webm", Some(1080), Some("1080p")),
            video("136", "mp4", Some(720), None),
            video("sb0", "mhtml", Some(90), Some("storyboard")),
            video("hls", "m3u8", Some(480), Some("480p")),
            video("x", "mp4", None, Some("Premium")),
            audio("140", Some(129.5), None),
        ];

        let options = video_options(&formats);

        assert_eq!(options, vec![
            VideoOption {
                quality: "1080p".to_string(),
                format_id: "137".to_string(),
                height: 1080
            },
            VideoOption {
                quality: "720p".to_string(),
                format_id: "136".to_string(),
                height: 720
            },
            VideoOption {
                quality: "144p".to_string(),
                format_id: "160".to_string(),
                height: 144
            },
        ]);
    }

    #[test]
    fn test_audio_options_round_dedupe_and_cap() {
        let formats = vec![
            audio("139", Some(48.8), None),
            audio("140", Some(129.5), None),
            audio("140-drc", Some(129.6), None),
            audio("251", None, Some(160.2)),
            audio("250", Some(70.0), None),
            audio("249", Some(50.0), None),
            audio("nobitrate", None, None),
            video("137", "mp4", Some(1080), Some("1080p")),
        ];

        let options = audio_options(&formats);

        let bitrates: Vec<u32> = options.iter().map(|o| o.bitrate).collect();
        assert_eq!(bitrates, vec![160, 130, 128, 70]);
        assert_eq!(options[1].format_id, "140");
    }

    #[test]
    fn test_empty_formats_use_defaults() {
        assert_eq!(video_options(&[]), default_video_options());
        assert_eq!(audio_options(&[]), default_audio_options());
    }

    #[test]
    fn test_option_invariants_over_generated_lists() {
        // Small LCG so the lists are varied but reproducible.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |bound: u64| {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            (seed >> 33) % bound
        };
        let heights = [144, 240, 360, 480, 720, 1080, 1440, 2160];
        let exts = ["mp4", "webm", "3gp"];

        for _ in 0..200 {
            let count = next(30);
            let mut formats = Vec::new();
            for i in 0..count {
                let id = i.to_string();
                if next(2) == 0 {
                    #[allow(clippy::cast_possible_truncation)]
                    let height = heights[next(heights.len() as u64) as usize];
                    let note = match next(3) {
                        0 => None,
                        1 => Some(format!("{height}p")),
                        _ => Some(format!("{height}p60"))
                    };
                    let ext = exts[usize::try_from(next(3)).unwrap()];
                    formats.push(video(&id, ext, Some(height), note.as_deref()));
                } else {
                    #[allow(clippy::cast_precision_loss)]
                    let abr = (next(300) as f64) + 0.5;
                    formats.push(audio(&id, Some(abr), None));
                }
            }

            let video = video_options(&formats);
            let audio = audio_options(&formats);

            assert!(!video.is_empty());
            assert!(!audio.is_empty());
            assert!(audio.len() <= MAX_AUDIO_OPTIONS);
            assert!(video.windows(2).all(|w| w[0].height >= w[1].height));
            assert!(audio.windows(2).all(|w| w[0].bitrate >= w[1].bitrate));
            for (i, option) in video.iter().enumerate() {
                assert!(video[i + 1..].iter().all(|o| o.quality != option.quality));
            }
            for (i, option) in audio.iter().enumerate() {
                assert!(audio[i + 1..].iter().all(|o| o.bitrate != option.bitrate));
            }
        }
    }

    #[test]
    fn test_metadata_defaults_and_json_shape() {
        let info: VideoInfo = serde_json::from_str(r#"{"duration": 3661, "view_count": 7}"#).unwrap();
        let metadata = VideoMetadata::from_info(&info);
        let json = serde_json::to_value(&metadata).unwrap();

        assert_eq!(json["title"], "Unknown");
        assert_eq!(json["channel"], "Unknown");
        assert_eq!(json["thumbnail"], "");
        assert_eq!(json["duration"], "1:01:01");
        assert_eq!(json["viewCount"], 7);
        assert_eq!(json["formats"]["video"][0]["quality"], "720p");
        assert_eq!(json["formats"]["video"][0]["format_id"], "22");
        assert_eq!(json["formats"]["audio"][0]["bitrate"], 128);
    }

    #[tokio::test]
    async fn test_fetch_info_runs_metadata_command() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::Config {
            cookie_browsers: Vec::new(),
            js_runtime: None,
            temp_dir: dir.path().to_path_buf(),
            ..crate::config::Config::default()
        };
        let chain = CredentialChain::from_config(&config);
        let runner = ScriptedRunner::new(vec![Step::ok(r#"{"title": "Clip", "formats": []}"#)]);

        let info = fetch_info(&runner, &chain, "https://youtu.be/abc", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(info.title.as_deref(), Some("Clip"));
        assert_eq!(runner.calls()[0].args, vec![
            "https://youtu.be/abc",
            "--dump-json",
            "--no-playlist",
            "--no-warnings",
            "--user-agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "--referer",
            "https://www.youtube.com/",
            "--add-header",
            "Accept-Language:en-US,en;q=0.9"
        ]);
    }

    #[tokio::test]
    async fn test_fetch_info_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::Config {
            cookie_browsers: Vec::new(),
            temp_dir: dir.path().to_path_buf(),
            ..crate::config::Config::default()
        };
        let chain = CredentialChain::from_config(&config);
        let runner = ScriptedRunner::new(vec![Step::ok("not json")]);

        let err = fetch_info(&runner, &chain, "https://youtu.be/abc", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Metadata(_)));
    }
}
