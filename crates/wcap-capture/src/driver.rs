//! Browser port and session settings

use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::DriverResult;

pub const DEFAULT_TARGET_URL: &str = "https://www.algarapictures.com/webcam";

/// Host serving the embedded video player
pub const DEFAULT_PLAYER_HOST: &str = "ipcamlive.com";

/// One live browser session. Coordinates are CSS pixels relative to the
/// current context (top-level page, or the entered frame).
#[async_trait::async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Driver name/identifier
    fn name(&self) -> &str;

    /// Load `url` in the top-level page
    async fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// Evaluate a script in the current context and return its value.
    /// `undefined` comes back as `Value::Null`.
    async fn evaluate(&mut self, script: &str) -> DriverResult<Value>;

    /// URLs of the embedded frames, in document order
    async fn frame_sources(&mut self) -> DriverResult<Vec<String>>;

    /// Switch the context to the frame at `index` of [`Self::frame_sources`]
    async fn enter_frame(&mut self, index: usize) -> DriverResult<()>;

    /// Return to the top-level page
    async fn leave_frame(&mut self) -> DriverResult<()>;

    async fn click_at(&mut self, x: f64, y: f64) -> DriverResult<()>;

    async fn move_mouse(&mut self, x: f64, y: f64) -> DriverResult<()>;

    /// PNG of the first top-level element matching `selector`
    async fn screenshot_element(&mut self, selector: &str) -> DriverResult<Vec<u8>>;

    /// PNG of the whole viewport
    async fn screenshot_viewport(&mut self) -> DriverResult<Vec<u8>>;

    /// Release the browser
    async fn close(&mut self) -> DriverResult<()>;
}

/// Creates a fresh browser per session
#[async_trait::async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, config: &SessionConfig) -> DriverResult<Box<dyn BrowserDriver>>;
}

/// Settle delays and deadlines used by the session steps
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTimings {
    pub post_navigation: Duration,
    pub banner_settle: Duration,
    pub consent_deadline: Duration,
    pub consent_poll: Duration,
    pub consent_recheck: Duration,
    pub frame_settle: Duration,
    pub gesture_settle: Duration,
    pub play_settle: Duration,
    pub playing_poll: Duration,
    pub playing_deadline: Duration,
    pub hover_settle: Duration,
    pub fullscreen_settle: Duration,
    pub pre_screenshot: Duration,
    pub capture_retry: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            post_navigation: Duration::from_secs(5),
            banner_settle: Duration::from_millis(500),
            consent_deadline: Duration::from_secs(8),
            consent_poll: Duration::from_millis(250),
            consent_recheck: Duration::from_millis(200),
            frame_settle: Duration::from_secs(2),
            gesture_settle: Duration::from_millis(300),
            play_settle: Duration::from_secs(1),
            playing_poll: Duration::from_millis(500),
            playing_deadline: Duration::from_secs(10),
            hover_settle: Duration::from_millis(300),
            fullscreen_settle: Duration::from_secs(2),
            pre_screenshot: Duration::from_secs(1),
            capture_retry: Duration::from_millis(500),
        }
    }
}

impl SessionTimings {
    /// No delays and zero deadlines; every poll makes exactly one attempt
    pub fn instant() -> Self {
        Self {
            post_navigation: Duration::ZERO,
            banner_settle: Duration::ZERO,
            consent_deadline: Duration::ZERO,
            consent_poll: Duration::ZERO,
            consent_recheck: Duration::ZERO,
            frame_settle: Duration::ZERO,
            gesture_settle: Duration::ZERO,
            play_settle: Duration::ZERO,
            playing_poll: Duration::ZERO,
            playing_deadline: Duration::ZERO,
            hover_settle: Duration::ZERO,
            fullscreen_settle: Duration::ZERO,
            pre_screenshot: Duration::ZERO,
            capture_retry: Duration::ZERO,
        }
    }
}

/// Everything one session needs to know
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub target_url: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_bin: Option<PathBuf>,
    pub player_host: String,
    /// Attempts at the tight player screenshot before the viewport fallback
    pub element_capture_attempts: u32,
    pub request_timeout: Duration,
    pub timings: SessionTimings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            viewport_width: 1920,
            viewport_height: 1080,
            chrome_bin: None,
            player_host: DEFAULT_PLAYER_HOST.to_string(),
            element_capture_attempts: 2,
            request_timeout: Duration::from_secs(60),
            timings: SessionTimings::default(),
        }
    }
}

impl SessionConfig {
    /// Whether a frame URL is served by the player host or a subdomain of it
    pub fn is_player_url(&self, frame_url: &str) -> bool {
        let host = self.player_host.trim().to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }
        match Url::parse(frame_url).ok().and_then(|u| u.host_str().map(str::to_ascii_lowercase)) {
            Some(frame_host) => frame_host == host || frame_host.ends_with(&format!(".{}", host)),
            None => frame_url.to_ascii_lowercase().contains(&host),
        }
    }

    /// Selector for the player's iframe element in the top-level page
    pub fn player_frame_selector(&self) -> String {
        format!("iframe[src*=\"{}\"]", self.player_host.replace('"', ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_url_matching() {
        let config = SessionConfig::default();
        assert!(config.is_player_url("https://g1.ipcamlive.com/player/player.php?alias=abc"));
        assert!(config.is_player_url("https://ipcamlive.com/x"));
        assert!(!config.is_player_url("https://www.youtube.com/embed/ipcamlive.com"));
        assert!(!config.is_player_url("https://notipcamlive.com/"));
        assert!(config.is_player_url("//g1.ipcamlive.com/player"));
        assert!(!config.is_player_url("about:blank"));
    }

    #[test]
    fn test_player_frame_selector() {
        let config = SessionConfig::default();
        assert_eq!(config.player_frame_selector(), "iframe[src*=\"ipcamlive.com\"]");
    }

    #[test]
    fn test_instant_timings_are_zero() {
        let t = SessionTimings::instant();
        assert_eq!(t.consent_deadline, Duration::ZERO);
        assert_eq!(t.playing_deadline, Duration::ZERO);
        assert_eq!(SessionTimings::default().playing_deadline, Duration::from_secs(10));
    }
}
