//! Header media and tutorial video embedding.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::spec::form::{Form, MediaType};

static YOUTUBE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtu\.be/|v/|u/\w/|embed/|watch\?v=|&v=)([^#&?/]{11})")
        .expect("static youtube pattern")
});
static VIMEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)vimeo\.com/(?:.*?/)?(\d+)").expect("static vimeo pattern")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaEmbed {
    Image { url: String },
    Logo { url: String },
    /// Player URL for a recognised video host.
    Player { url: String },
    /// Video URL from a host without an embeddable player.
    Link { url: String },
}

/// Resolves a video URL to an embeddable player when the host is known.
pub fn video_embed(url: &str) -> MediaEmbed {
    if let Some(id) = YOUTUBE_ID.captures(url).and_then(|caps| caps.get(1)) {
        return MediaEmbed::Player {
            url: format!("https://www.youtube.com/embed/{}?rel=0", id.as_str()),
        };
    }
    if let Some(id) = VIMEO_ID.captures(url).and_then(|caps| caps.get(1)) {
        return MediaEmbed::Player {
            url: format!("https://player.vimeo.com/video/{}", id.as_str()),
        };
    }
    MediaEmbed::Link {
        url: url.to_string(),
    }
}

pub fn form_media(form: &Form) -> Option<MediaEmbed> {
    let url = form
        .media_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())?
        .to_string();
    match form.media_type {
        MediaType::None => None,
        MediaType::Image => Some(MediaEmbed::Image { url }),
        MediaType::Logo => Some(MediaEmbed::Logo { url }),
        MediaType::Video => Some(video_embed(&url)),
    }
}

pub fn tutorial_embed(form: &Form) -> Option<MediaEmbed> {
    form.tutorial_video_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(video_embed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn youtube_urls_become_embed_players() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
        ] {
            assert_eq!(
                video_embed(url),
                MediaEmbed::Player {
                    url: "https://www.youtube.com/embed/dQw4w9WgXcQ?rel=0".into()
                }
            );
        }
    }

    #[test]
    fn vimeo_and_unknown_hosts() {
        assert_eq!(
            video_embed("https://vimeo.com/channels/staffpicks/76979871"),
            MediaEmbed::Player {
                url: "https://player.vimeo.com/video/76979871".into()
            }
        );
        assert_eq!(
            video_embed("https://cdn.example.com/intro.mp4"),
            MediaEmbed::Link {
                url: "https://cdn.example.com/intro.mp4".into()
            }
        );
    }
}
