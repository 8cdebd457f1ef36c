use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CiderError, Result};

/// Genre reported when the server sends no `genreNames`.
pub const UNKNOWN_GENRE: &str = "Unknown";

/// Immutable snapshot of what Cider is playing.
///
/// Two snapshots describe the same song when their [`Track::id`] matches;
/// position and duration never take part in that comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    title: String,
    artist: String,
    album: String,
    artwork_url: Option<String>,
    /// Seconds
    duration: f64,
    /// Seconds
    current_time: f64,
    genre: String,
}

impl Track {
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        artwork_url: Option<String>,
        duration: f64,
        current_time: f64,
        genre: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            artwork_url,
            duration,
            current_time,
            genre: genre.into(),
        }
    }

    /// Identity used for "track changed" detection: `title|artist`.
    pub fn id(&self) -> String {
        format!("{}|{}", self.title, self.artist)
    }

    pub fn same_song(&self, other: &Track) -> bool {
        self.title == other.title && self.artist == other.artist
    }

    /// Builds a track from a `/now-playing` response body.
    pub fn from_now_playing(body: &str) -> Result<Self> {
        let response: NowPlayingResponse = serde_json::from_str(body)?;
        response.info.try_into()
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn artist(&self) -> &str {
        &self.artist
    }
    pub fn album(&self) -> &str {
        &self.album
    }
    pub fn artwork_url(&self) -> Option<&str> {
        self.artwork_url.as_deref()
    }
    pub fn duration(&self) -> f64 {
        self.duration
    }
    pub fn current_time(&self) -> f64 {
        self.current_time
    }
    pub fn genre(&self) -> &str {
        &self.genre
    }

    /// Artwork URL with Apple Music's `{w}`/`{h}` size template filled in.
    pub fn artwork_url_sized(&self, width: u32, height: u32) -> Option<String> {
        self.artwork_url.as_ref().map(|url| {
            url.replace("{w}", &width.to_string())
                .replace("{h}", &height.to_string())
        })
    }

    /// Playback progress in `[0, 1]`, zero when the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.artist, self.title, self.album)
    }
}

#[derive(Debug, Deserialize)]
struct NowPlayingResponse {
    info: NowPlayingInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NowPlayingInfo {
    name: String,
    artist_name: String,
    album_name: String,
    duration_in_millis: f64,
    current_playback_time: Option<f64>,
    genre_names: Option<Vec<String>>,
    artwork: Option<Artwork>,
}

#[derive(Debug, Deserialize)]
struct Artwork {
    url: String,
}

impl TryFrom<NowPlayingInfo> for Track {
    type Error = CiderError;

    fn try_from(info: NowPlayingInfo) -> Result<Self> {
        if !info.duration_in_millis.is_finite() || info.duration_in_millis < 0.0 {
            return Err(CiderError::InvalidBody(format!(
                "now-playing (durationInMillis = {})",
                info.duration_in_millis
            )));
        }

        let genre = info
            .genre_names
            .and_then(|genres| genres.into_iter().next())
            .unwrap_or_else(|| UNKNOWN_GENRE.to_string());

        Ok(Track {
            title: info.name,
            artist: info.artist_name,
            album: info.album_name,
            artwork_url: info.artwork.map(|artwork| artwork.url),
            // Whole milliseconds, like the server's integer field.
            duration: info.duration_in_millis.trunc() / 1000.0,
            current_time: info.current_playback_time.unwrap_or(0.0),
            genre,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL_BODY: &str = r#"{
        "status": "ok",
        "info": {
            "name": "Song A",
            "artistName": "Artist X",
            "albumName": "Album Z",
            "durationInMillis": 200000,
            "currentPlaybackTime": 12.5,
            "genreNames": ["Electronic", "Dance"],
            "artwork": { "url": "https://is1.example/{w}x{h}bb.jpg", "width": 3000 }
        }
    }"#;

    #[test]
    fn test_parses_full_now_playing_document() {
        let track = Track::from_now_playing(FULL_BODY).unwrap();
        assert_eq!(
            track,
            Track::new(
                "Song A",
                "Artist X",
                "Album Z",
                Some("https://is1.example/{w}x{h}bb.jpg".to_string()),
                200.0,
                12.5,
                "Electronic",
            )
        );
        assert_eq!(track.id(), "Song A|Artist X");
        assert_eq!(track.to_string(), "Artist X - Song A (Album Z)");
    }

    #[test]
    fn test_optional_fields_fall_back_to_defaults() {
        let body = r#"{"info":{"name":"Song A","artistName":"Artist X","albumName":"","durationInMillis":200000,"genreNames":[]}}"#;
        let track = Track::from_now_playing(body).unwrap();
        assert_eq!(track.duration(), 200.0);
        assert_eq!(track.current_time(), 0.0);
        assert_eq!(track.genre(), UNKNOWN_GENRE);
        assert_eq!(track.artwork_url(), None);
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let body = r#"{"info":{"name":"Song A","albumName":"Z","durationInMillis":1000}}"#;
        assert!(matches!(
            Track::from_now_playing(body),
            Err(CiderError::Json(_))
        ));
        assert!(Track::from_now_playing(r#"{"status":"ok"}"#).is_err());
        assert!(Track::from_now_playing("").is_err());
    }

    #[test]
    fn test_artwork_without_url_is_rejected() {
        let body = r#"{"info":{"name":"A","artistName":"B","albumName":"C","durationInMillis":1000,"artwork":{}}}"#;
        assert!(Track::from_now_playing(body).is_err());
    }

    #[test]
    fn test_identity_ignores_position_and_duration() {
        let first = Track::new("Song A", "Artist X", "Album", None, 200.0, 1.0, "Pop");
        let later = Track::new("Song A", "Artist X", "Album", None, 201.0, 95.0, "Pop");
        let other = Track::new("Song A", "Artist Y", "Album", None, 200.0, 1.0, "Pop");

        assert_eq!(first.id(), later.id());
        assert!(first.same_song(&later));
        assert!(!first.same_song(&other));
    }

    #[test]
    fn test_artwork_size_template() {
        let track = Track::from_now_playing(FULL_BODY).unwrap();
        assert_eq!(
            track.artwork_url_sized(256, 256).as_deref(),
            Some("https://is1.example/256x256bb.jpg")
        );
        assert_eq!(track.progress(), 12.5 / 200.0);
    }
}
