use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Container format recognised by the sniffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaFormat {
    Gif,
    Jpeg,
    Png,
    Tiff,
    IsoBaseMedia,
    QuickTime,
    Mpeg4Video,
    AvchdMts,
    Unknown,
}

impl MediaFormat {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Tiff => "tiff",
            Self::IsoBaseMedia => "iso-base-media",
            Self::QuickTime => "quicktime",
            Self::Mpeg4Video => "mpeg4-video",
            Self::AvchdMts => "avchd-mts",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaClass {
    Image,
    Video,
    Unknown,
}

impl fmt::Display for MediaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Unknown => "unknown",
        })
    }
}

/// What the pipeline learned about one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaMetadata {
    pub format: MediaFormat,
    pub class: MediaClass,
    /// Embedded creation time as local calendar fields; `None` when it could
    /// not be determined.
    pub created_on: Option<NaiveDateTime>,
}

impl MediaMetadata {
    pub fn unknown() -> Self {
        Self {
            format: MediaFormat::Unknown,
            class: MediaClass::Unknown,
            created_on: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self.class, MediaClass::Image | MediaClass::Video)
    }
}

impl fmt::Display for MediaMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.created_on {
            Some(dt) => write!(f, "{}/{} created {}", self.format, self.class, dt),
            None => write!(f, "{}/{} created unknown", self.format, self.class),
        }
    }
}
