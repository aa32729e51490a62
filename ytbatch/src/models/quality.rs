use std::str::FromStr;

use serde::{Deserialize, Serialize};
use yt_dlp::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityMode {
    BestCombined,
    #[default]
    Default,
    AudioOnly,
    VideoOnly
}

#[derive(Debug, thiserror::Error)]
#[error("unknown quality mode: {0}")]
pub struct ParseQualityError(String);

impl QualityMode {
    pub const ALL: [QualityMode; 4] = [
        Self::BestCombined,
        Self::Default,
        Self::AudioOnly,
        Self::VideoOnly
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::BestCombined => "Best quality",
            Self::Default => "Default quality",
            Self::AudioOnly => "Audio only",
            Self::VideoOnly => "Video Only"
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BestCombined => "best-combined",
            Self::Default => "default",
            Self::AudioOnly => "audio-only",
            Self::VideoOnly => "video-only"
        }
    }

    pub fn output_format(self) -> OutputFormat {
        match self {
            Self::BestCombined => OutputFormat::BestVideoBestAudio,
            Self::Default => OutputFormat::Best,
            Self::AudioOnly => OutputFormat::BestAudio,
            Self::VideoOnly => OutputFormat::BestVideo
        }
    }

    pub fn format_selector(self) -> String {
        self.output_format().as_arg().unwrap_or_default()
    }

    /// Dual-stream modes fetch video and audio as two separate downloads.
    pub fn is_dual_stream(self) -> bool {
        self.output_format().is_merged()
    }
}

impl FromStr for QualityMode {
    type Err = ParseQualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|mode| {
                wanted.eq_ignore_ascii_case(mode.label())
                    || wanted.eq_ignore_ascii_case(mode.name())
                    || wanted.eq_ignore_ascii_case(&mode.format_selector())
            })
            .ok_or_else(|| ParseQualityError(wanted.to_string()))
    }
}

impl std::fmt::Display for QualityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
