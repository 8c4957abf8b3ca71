//! Video stream resolution.
//!
//! The panel only decides *which* robot is on screen; turning that choice
//! into a playable URL is the job of a [`StreamResolver`].

/// Pane the main view selection is shown in.
pub const MAIN_VIEW_SLOT: usize = 0;

/// Maps a (data source, slot index) pair to a stream URL.
pub trait StreamResolver: Send + Sync {
    fn stream_url(&self, source: &str, slot: usize) -> String;
}

/// Resolver for a ROS `web_video_server` serving MJPEG camera topics.
///
/// ```
/// use cnr_cockpit::video::{StreamResolver, WebVideoServer};
///
/// let videos = WebVideoServer::new("http://fleming.local:8081/");
/// assert_eq!(
///     videos.stream_url("Deckard", 0),
///     "http://fleming.local:8081/stream?topic=/deckard/camera/rgb/image_raw&slot=0"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct WebVideoServer {
    base_url: String,
}

impl WebVideoServer {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl StreamResolver for WebVideoServer {
    fn stream_url(&self, source: &str, slot: usize) -> String {
        format!(
            "{}/stream?topic=/{}/camera/rgb/image_raw&slot={slot}",
            self.base_url,
            source.to_lowercase()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let videos = WebVideoServer::new("http://localhost:8081///");
        assert_eq!(videos.base_url(), "http://localhost:8081");
    }

    #[test]
    fn slot_and_lowercased_source_are_encoded() {
        let videos = WebVideoServer::new("http://localhost:8081");
        assert_eq!(
            videos.stream_url("Zhora", 2),
            "http://localhost:8081/stream?topic=/zhora/camera/rgb/image_raw&slot=2"
        );
    }
}
