//! DOM heuristics for the session steps
//!
//! Each heuristic is a [`Strategy`]: it either acts and reports `true`, or
//! finds nothing actionable and reports `false`. Errors count as misses.
//! Scripts carry a `/*tag*/` prefix naming what they do.

use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::{BrowserDriver, DriverResult};

pub const TAG_CLICK_SELECTORS: &str = "click-selectors";
pub const TAG_CLICK_TEXT: &str = "click-text";
pub const TAG_CLICK_ATTRIBUTE: &str = "click-attribute";
pub const TAG_BODY_CLICK: &str = "body-click";
pub const TAG_CLICK_CLASS: &str = "click-class";
pub const TAG_VIEWPORT_SIZE: &str = "viewport-size";
pub const TAG_CENTER_ELEMENT_CLICK: &str = "center-element-click";
pub const TAG_PLAY_VIDEO: &str = "play-video";
pub const TAG_REQUEST_FULLSCREEN: &str = "request-fullscreen";
pub const TAG_PLAYER_RECT: &str = "player-rect";
pub const TAG_VIDEO_PLAYING: &str = "video-playing";
pub const TAG_ELEMENT_PRESENT: &str = "element-present";

pub const COOKIE_BANNER_SELECTOR: &str = "#d-notification-bar .notification-dismiss";
pub const COOKIE_BANNER_FALLBACKS: &[&str] = &[".notification-dismiss", "[aria-label=\"Dismiss notification\"]"];

pub const CONSENT_ROOT: &str = ".fc-consent-root";
pub const CONSENT_SELECTORS: &[&str] = &[
    "button.fc-cta-consent",
    "button.fc-data-preferences-accept-all",
    "button.fc-vendor-preferences-accept-all",
    "button.fc-confirm-choices",
    ".fc-consent-root button.fc-primary-button",
];
pub const CONSENT_CANDIDATES: &str =
    "button, [role=\"button\"], .fc-consent-root button, .fc-consent-root [role=\"button\"]";
pub const CONSENT_PHRASES: &[&str] = &[
    "consent",
    "accept",
    "accept all",
    "agree",
    "allow",
    "confirm",
    "ok",
    "aceptar",
    "aceptar todo",
    "consentir",
    "confirmar",
    "permitir",
    "de acuerdo",
];

pub const PLAY_SELECTORS: &[&str] = &[
    ".vjs-big-play-button",
    ".jw-icon-playback",
    ".jw-icon-play",
    ".fp-play",
    "button[aria-label*=\"play\" i]",
    "button[title*=\"play\" i]",
    "button[aria-label*=\"reproducir\" i]",
    "button[title*=\"reproducir\" i]",
    "button[class*=\"play\" i]",
    "[class*=\"big-play\" i]",
];
pub const PLAY_TOKENS: &[&str] = &["play", "reproducir"];
pub const PLAY_CLASS_CANDIDATES: &str = "[class*=\"play\"], [class*=\"Play\"]";

pub const FULLSCREEN_SELECTORS: &[&str] = &[
    "button[aria-label*=\"Full\" i]",
    "button[title*=\"Full\" i]",
    "button[aria-label*=\"pantalla\" i]",
    "button[title*=\"pantalla\" i]",
    ".vjs-fullscreen-control",
    ".jw-icon-fullscreen",
    "button[class*=\"full\" i]",
    "[class*=\"fullscreen\" i]",
    "a[title*=\"full\" i]",
];
pub const FULLSCREEN_TOKENS: &[&str] = &["full", "pantalla"];

pub const PLAYER_ELEMENTS: &str = "video, .vjs-tech, .jw-video, canvas, .player, [class*=\"player\" i]";
pub const FULLSCREEN_TARGETS: &str = "video, canvas, .player, #player, [class*=\"player\"]";

fn tagged(tag: &str, body: String) -> String {
    format!("/*{}*/{}", tag, body)
}

fn args(value: Value) -> String {
    value.to_string()
}

/// Scripts report success with `true` or a non-empty string
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(_) | Value::Object(_) | Value::Array(_) => true,
        Value::Null => false,
    }
}

/// Whether `selector` matches anything in the current context
pub async fn element_present(driver: &mut dyn BrowserDriver, selector: &str) -> DriverResult<bool> {
    let script = tagged(
        TAG_ELEMENT_PRESENT,
        format!("!!document.querySelector({})", args(json!(selector))),
    );
    Ok(truthy(&driver.evaluate(&script).await?))
}

/// A heuristic for one interaction
#[async_trait::async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Act if possible; `Ok(false)` means nothing actionable was found
    async fn try_apply(&self, driver: &mut dyn BrowserDriver) -> DriverResult<bool>;
}

/// Run `strategies` in order and stop at the first that acts. Returns its
/// name, or `None` when every strategy missed.
pub async fn apply_first<'a>(
    strategies: &'a [Box<dyn Strategy>],
    driver: &mut dyn BrowserDriver,
) -> Option<&'a str> {
    for strategy in strategies {
        match strategy.try_apply(driver).await {
            Ok(true) => {
                debug!(strategy = strategy.name(), "Strategy applied");
                return Some(strategy.name());
            }
            Ok(false) => debug!(strategy = strategy.name(), "Strategy found nothing"),
            Err(e) => debug!(strategy = strategy.name(), error = %e, "Strategy failed"),
        }
    }
    None
}

/// Repeat `strategy` every `interval` until it acts or `deadline` passes.
/// At least one attempt is always made.
pub async fn poll_until(
    driver: &mut dyn BrowserDriver,
    strategy: &dyn Strategy,
    deadline: Duration,
    interval: Duration,
) -> bool {
    let mut poll = Poller::new(deadline, interval);
    loop {
        match strategy.try_apply(driver).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => debug!(strategy = strategy.name(), error = %e, "Poll attempt failed"),
        }
        if !poll.wait().await {
            return false;
        }
    }
}

/// Deadline bookkeeping for hand-written poll loops
pub struct Poller {
    until: Instant,
    interval: Duration,
}

impl Poller {
    pub fn new(deadline: Duration, interval: Duration) -> Self {
        Self {
            until: Instant::now() + deadline,
            interval,
        }
    }

    /// Sleep one interval; `false` once the deadline has passed
    pub async fn wait(&mut self) -> bool {
        if Instant::now() + self.interval >= self.until {
            return false;
        }
        sleep(self.interval).await;
        true
    }
}

/// Click the first visible match of one selector
pub struct ScriptClick {
    selector: String,
}

impl ScriptClick {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

#[async_trait::async_trait]
impl Strategy for ScriptClick {
    fn name(&self) -> &str {
        &self.selector
    }

    async fn try_apply(&self, driver: &mut dyn BrowserDriver) -> DriverResult<bool> {
        SelectorListClick::single(&self.selector).try_apply(driver).await
    }
}

/// Click the first visible match from an ordered selector list
pub struct SelectorListClick {
    name: String,
    selectors: Vec<String>,
}

impl SelectorListClick {
    pub fn new(name: impl Into<String>, selectors: &[&str]) -> Self {
        Self {
            name: name.into(),
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn single(selector: &str) -> Self {
        Self::new(selector, &[selector])
    }

    pub fn script(&self) -> String {
        tagged(
            TAG_CLICK_SELECTORS,
            format!(
                "(function(selectors){{\
                   for (var i = 0; i < selectors.length; i++) {{\
                     try {{\
                       var el = document.querySelector(selectors[i]);\
                       if (el && el.offsetParent !== null) {{ el.click(); return selectors[i]; }}\
                     }} catch (e) {{}}\
                   }}\
                   return null;\
                 }})({})",
                args(json!(self.selectors))
            ),
        )
    }
}

#[async_trait::async_trait]
impl Strategy for SelectorListClick {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_apply(&self, driver: &mut dyn BrowserDriver) -> DriverResult<bool> {
        Ok(truthy(&driver.evaluate(&self.script()).await?))
    }
}

/// Click an interactive element whose text is, or starts with, one of the
/// phrases (case-insensitive)
pub struct TextMatchClick {
    candidates: String,
    phrases: Vec<String>,
}

impl TextMatchClick {
    pub fn new(candidates: &str, phrases: &[&str]) -> Self {
        Self {
            candidates: candidates.to_string(),
            phrases: phrases.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    pub fn consent() -> Self {
        Self::new(CONSENT_CANDIDATES, CONSENT_PHRASES)
    }

    pub fn script(&self) -> String {
        tagged(
            TAG_CLICK_TEXT,
            format!(
                "(function(candidates, phrases){{\
                   var els = document.querySelectorAll(candidates);\
                   for (var i = 0; i < els.length; i++) {{\
                     var text = (els[i].innerText || els[i].textContent || '').trim().toLowerCase();\
                     if (!text) continue;\
                     for (var j = 0; j < phrases.length; j++) {{\
                       var p = phrases[j];\
                       if (text === p || text.indexOf(p + ' ') === 0 || text.indexOf(p + '\\n') === 0) {{\
                         els[i].click(); return text;\
                       }}\
                     }}\
                   }}\
                   return null;\
                 }})({}, {})",
                args(json!(self.candidates)),
                args(json!(self.phrases))
            ),
        )
    }
}

#[async_trait::async_trait]
impl Strategy for TextMatchClick {
    fn name(&self) -> &str {
        "text-match"
    }

    async fn try_apply(&self, driver: &mut dyn BrowserDriver) -> DriverResult<bool> {
        Ok(truthy(&driver.evaluate(&self.script()).await?))
    }
}

/// Click a visible control whose `aria-label`, `title` or class contains a
/// token (case-insensitive)
pub struct AttributeMatchClick {
    name: String,
    candidates: String,
    tokens: Vec<String>,
}

impl AttributeMatchClick {
    pub fn new(name: impl Into<String>, candidates: &str, tokens: &[&str]) -> Self {
        Self {
            name: name.into(),
            candidates: candidates.to_string(),
            tokens: tokens.iter().map(|t| t.to_lowercase()).collect(),
        }
    }

    pub fn play() -> Self {
        Self::new("play-attribute", "button, [role=\"button\"]", PLAY_TOKENS)
    }

    pub fn fullscreen() -> Self {
        Self::new("fullscreen-attribute", "button, [role=\"button\"], a", FULLSCREEN_TOKENS)
    }

    pub fn script(&self) -> String {
        tagged(
            TAG_CLICK_ATTRIBUTE,
            format!(
                "(function(candidates, tokens){{\
                   var els = document.querySelectorAll(candidates);\
                   for (var i = 0; i < els.length; i++) {{\
                     var el = els[i];\
                     var hay = [el.getAttribute('aria-label') || '', el.getAttribute('title') || '',\
                                typeof el.className === 'string' ? el.className : ''].join(' ').toLowerCase();\
                     for (var j = 0; j < tokens.length; j++) {{\
                       if (hay.indexOf(tokens[j]) !== -1 && el.offsetParent !== null) {{ el.click(); return tokens[j]; }}\
                     }}\
                   }}\
                   return null;\
                 }})({}, {})",
                args(json!(self.candidates)),
                args(json!(self.tokens))
            ),
        )
    }
}

#[async_trait::async_trait]
impl Strategy for AttributeMatchClick {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_apply(&self, driver: &mut dyn BrowserDriver) -> DriverResult<bool> {
        Ok(truthy(&driver.evaluate(&self.script()).await?))
    }
}

/// DOM click on the document body, a user-gesture proxy
pub struct BodyClick;

#[async_trait::async_trait]
impl Strategy for BodyClick {
    fn name(&self) -> &str {
        "body-click"
    }

    async fn try_apply(&self, driver: &mut dyn BrowserDriver) -> DriverResult<bool> {
        let script = tagged(
            TAG_BODY_CLICK,
            "(function(){ if (!document.body) return false; document.body.click(); return true; })()".to_string(),
        );
        Ok(truthy(&driver.evaluate(&script).await?))
    }
}

/// Mouse click at the centre of the current viewport, where big-play
/// overlays usually sit
pub struct ViewportCenterClick {
    fallback: (f64, f64),
}

impl ViewportCenterClick {
    /// `fallback` is used when the context cannot report its size
    pub fn new(fallback_width: u32, fallback_height: u32) -> Self {
        Self {
            fallback: (fallback_width as f64, fallback_height as f64),
        }
    }
}

#[async_trait::async_trait]
impl Strategy for ViewportCenterClick {
    fn name(&self) -> &str {
        "viewport-center"
    }

    async fn try_apply(&self, driver: &mut dyn BrowserDriver) -> DriverResult<bool> {
        let script = tagged(
            TAG_VIEWPORT_SIZE,
            "({ width: window.innerWidth || document.documentElement.clientWidth,\
                height: window.innerHeight || document.documentElement.clientHeight })"
                .to_string(),
        );
        let size = driver.evaluate(&script).await?;
        let width = size.get("width").and_then(Value::as_f64).unwrap_or(self.fallback.0);
        let height = size.get("height").and_then(Value::as_f64).unwrap_or(self.fallback.1);
        match driver.click_at((width / 2.0).floor(), (height / 2.0).floor()).await {
            Ok(()) => Ok(true),
            Err(e) => {
                debug!(error = %e, "Native centre click failed, clicking the element under it");
                let script = tagged(
                    TAG_CENTER_ELEMENT_CLICK,
                    "(function(){\
                       var w = window.innerWidth || document.documentElement.clientWidth;\
                       var h = window.innerHeight || document.documentElement.clientHeight;\
                       var el = document.elementFromPoint(w / 2, h / 2);\
                       if (el) { el.click(); return true; }\
                       return false;\
                     })()"
                        .to_string(),
                );
                Ok(truthy(&driver.evaluate(&script).await?))
            }
        }
    }
}

/// Click the first visible element among every match of `candidates`
pub struct VisibleMatchClick {
    name: String,
    candidates: String,
}

impl VisibleMatchClick {
    pub fn new(name: impl Into<String>, candidates: &str) -> Self {
        Self {
            name: name.into(),
            candidates: candidates.to_string(),
        }
    }

    /// Anything whose class mentions play
    pub fn play_class() -> Self {
        Self::new("play-class", PLAY_CLASS_CANDIDATES)
    }

    pub fn script(&self) -> String {
        tagged(
            TAG_CLICK_CLASS,
            format!(
                "(function(candidates){{\
                   var els = document.querySelectorAll(candidates);\
                   for (var i = 0; i < els.length; i++) {{\
                     if (els[i].offsetParent !== null) {{ els[i].click(); return true; }}\
                   }}\
                   return false;\
                 }})({})",
                args(json!(self.candidates))
            ),
        )
    }
}

#[async_trait::async_trait]
impl Strategy for VisibleMatchClick {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_apply(&self, driver: &mut dyn BrowserDriver) -> DriverResult<bool> {
        Ok(truthy(&driver.evaluate(&self.script()).await?))
    }
}

/// Start the first `<video>` directly, muted
pub struct ProgrammaticPlay;

#[async_trait::async_trait]
impl Strategy for ProgrammaticPlay {
    fn name(&self) -> &str {
        "programmatic-play"
    }

    async fn try_apply(&self, driver: &mut dyn BrowserDriver) -> DriverResult<bool> {
        let script = tagged(
            TAG_PLAY_VIDEO,
            "(function(){\
               var v = document.querySelector('video');\
               if (!v) return false;\
               try { v.muted = true; } catch (e) {}\
               try { v.play(); return true; } catch (e) { return false; }\
             })()"
                .to_string(),
        );
        Ok(truthy(&driver.evaluate(&script).await?))
    }
}

/// `requestFullscreen()` on the player element or the document
pub struct ProgrammaticFullscreen;

#[async_trait::async_trait]
impl Strategy for ProgrammaticFullscreen {
    fn name(&self) -> &str {
        "programmatic-fullscreen"
    }

    async fn try_apply(&self, driver: &mut dyn BrowserDriver) -> DriverResult<bool> {
        let script = tagged(
            TAG_REQUEST_FULLSCREEN,
            format!(
                "(function(sel){{\
                   var target = document.querySelector(sel) || document.documentElement;\
                   if (target && target.requestFullscreen) {{\
                     try {{ target.requestFullscreen(); return true; }} catch (e) {{}}\
                   }}\
                   return false;\
                 }})({})",
                args(json!(FULLSCREEN_TARGETS))
            ),
        );
        Ok(truthy(&driver.evaluate(&script).await?))
    }
}

/// Move the mouse just inside the player's bottom-right corner so hidden
/// controls show up
pub struct HoverPlayerCorner;

impl HoverPlayerCorner {
    const INSET: f64 = 10.0;
}

#[async_trait::async_trait]
impl Strategy for HoverPlayerCorner {
    fn name(&self) -> &str {
        "hover-player-corner"
    }

    async fn try_apply(&self, driver: &mut dyn BrowserDriver) -> DriverResult<bool> {
        let script = tagged(
            TAG_PLAYER_RECT,
            format!(
                "(function(sel){{\
                   var el = document.querySelector(sel);\
                   if (!el) return null;\
                   var r = el.getBoundingClientRect();\
                   return {{ x: r.x, y: r.y, width: r.width, height: r.height }};\
                 }})({})",
                args(json!(PLAYER_ELEMENTS))
            ),
        );
        let rect = driver.evaluate(&script).await?;
        let field = |key: &str| rect.get(key).and_then(Value::as_f64);
        let (Some(x), Some(y), Some(w), Some(h)) = (field("x"), field("y"), field("width"), field("height")) else {
            return Ok(false);
        };
        driver
            .move_mouse((x + w - Self::INSET).floor(), (y + h - Self::INSET).floor())
            .await?;
        Ok(true)
    }
}

/// Reports whether a video is unpaused with at least one frame buffered
pub struct VideoPlaying;

#[async_trait::async_trait]
impl Strategy for VideoPlaying {
    fn name(&self) -> &str {
        "video-playing"
    }

    async fn try_apply(&self, driver: &mut dyn BrowserDriver) -> DriverResult<bool> {
        let script = tagged(
            TAG_VIDEO_PLAYING,
            "(function(){ var v = document.querySelector('video'); return !!(v && !v.paused && v.readyState >= 2); })()"
                .to_string(),
        );
        Ok(truthy(&driver.evaluate(&script).await?))
    }
}

/// Cookie-banner tiers: the site's own dismiss button, then generic ones
pub fn banner_strategies() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(ScriptClick::new(COOKIE_BANNER_SELECTOR)),
        Box::new(SelectorListClick::new("banner-fallbacks", COOKIE_BANNER_FALLBACKS)),
    ]
}

/// Consent tiers: known consent-manager buttons, then affirmative text
pub fn consent_strategies() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(SelectorListClick::new("consent-selectors", CONSENT_SELECTORS)),
        Box::new(TextMatchClick::consent()),
    ]
}

/// Play-button tiers after the gesture clicks
pub fn play_strategies() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(SelectorListClick::new("play-selectors", PLAY_SELECTORS)),
        Box::new(AttributeMatchClick::play()),
        Box::new(VisibleMatchClick::play_class()),
        Box::new(ProgrammaticPlay),
    ]
}

pub fn fullscreen_strategies() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(SelectorListClick::new("fullscreen-selectors", FULLSCREEN_SELECTORS)),
        Box::new(AttributeMatchClick::fullscreen()),
        Box::new(ProgrammaticFullscreen),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DriverCall, DriverOp, ScriptedDriver};

    #[tokio::test]
    async fn test_apply_first_stops_at_first_hit() {
        let mut driver = ScriptedDriver::new().on_script(TAG_CLICK_ATTRIBUTE, json!("play"));
        let strategies = play_strategies();

        let winner = apply_first(&strategies, &mut driver).await;

        assert_eq!(winner, Some("play-attribute"));
        assert!(!driver.ran_script(TAG_PLAY_VIDEO));
    }

    #[tokio::test]
    async fn test_errors_are_misses() {
        let mut driver = ScriptedDriver::new().fail_always(DriverOp::Evaluate);
        let strategies = consent_strategies();
        assert_eq!(apply_first(&strategies, &mut driver).await, None);
        assert_eq!(driver.count(DriverOp::Evaluate), 2);
    }

    #[tokio::test]
    async fn test_viewport_center_uses_reported_size() {
        let mut driver =
            ScriptedDriver::new().on_script(TAG_VIEWPORT_SIZE, json!({"width": 1280, "height": 721}));
        assert!(ViewportCenterClick::new(1920, 1080).try_apply(&mut driver).await.unwrap());
        assert!(driver.calls().contains(&DriverCall::ClickAt(640.0, 360.0)));
    }

    #[tokio::test]
    async fn test_viewport_center_falls_back_to_configured_size() {
        let mut driver = ScriptedDriver::new();
        assert!(ViewportCenterClick::new(1920, 1080).try_apply(&mut driver).await.unwrap());
        assert!(driver.calls().contains(&DriverCall::ClickAt(960.0, 540.0)));
    }

    #[tokio::test]
    async fn test_viewport_center_clicks_element_under_point_when_native_click_fails() {
        let mut driver = ScriptedDriver::new()
            .fail_always(DriverOp::ClickAt)
            .on_script(TAG_CENTER_ELEMENT_CLICK, json!(true));

        assert!(ViewportCenterClick::new(1920, 1080).try_apply(&mut driver).await.unwrap());

        let calls = driver.calls();
        let click = calls.iter().position(|c| c.op() == DriverOp::ClickAt).unwrap();
        let fallback = calls
            .iter()
            .position(|c| matches!(c, DriverCall::Evaluate(t) if t == TAG_CENTER_ELEMENT_CLICK))
            .unwrap();
        assert!(click < fallback);
    }

    #[tokio::test]
    async fn test_viewport_center_without_element_is_a_miss() {
        let mut driver = ScriptedDriver::new().fail_always(DriverOp::ClickAt);
        assert!(!ViewportCenterClick::new(1920, 1080).try_apply(&mut driver).await.unwrap());
        assert!(driver.ran_script(TAG_CENTER_ELEMENT_CLICK));
    }

    #[tokio::test]
    async fn test_play_tiers_run_in_order() {
        let mut driver = ScriptedDriver::new().on_script(TAG_PLAY_VIDEO, json!(true));
        let strategies = play_strategies();

        let winner = apply_first(&strategies, &mut driver).await;

        assert_eq!(winner, Some("programmatic-play"));
        let tags: Vec<String> = driver
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                DriverCall::Evaluate(tag) => Some(tag),
                _ => None,
            })
            .collect();
        assert_eq!(
            tags,
            vec![TAG_CLICK_SELECTORS, TAG_CLICK_ATTRIBUTE, TAG_CLICK_CLASS, TAG_PLAY_VIDEO]
        );
    }

    #[tokio::test]
    async fn test_play_class_tier_wins_before_programmatic_play() {
        let mut driver = ScriptedDriver::new()
            .on_script(TAG_CLICK_CLASS, json!(true))
            .on_script(TAG_PLAY_VIDEO, json!(true));
        let strategies = play_strategies();

        assert_eq!(apply_first(&strategies, &mut driver).await, Some("play-class"));
        assert!(!driver.ran_script(TAG_PLAY_VIDEO));
    }

    #[tokio::test]
    async fn test_hover_without_player_is_a_miss() {
        let mut driver = ScriptedDriver::new();
        assert!(!HoverPlayerCorner.try_apply(&mut driver).await.unwrap());

        let mut driver = ScriptedDriver::new()
            .on_script(TAG_PLAYER_RECT, json!({"x": 0, "y": 0, "width": 640, "height": 360}));
        assert!(HoverPlayerCorner.try_apply(&mut driver).await.unwrap());
        assert!(driver.calls().contains(&DriverCall::MoveMouse(630.0, 350.0)));
    }

    #[tokio::test]
    async fn test_poll_until_makes_one_attempt_with_zero_deadline() {
        let mut driver = ScriptedDriver::new();
        let hit = poll_until(&mut driver, &VideoPlaying, Duration::ZERO, Duration::ZERO).await;
        assert!(!hit);
        assert_eq!(driver.count(DriverOp::Evaluate), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_retries_until_predicate_holds() {
        let mut driver = ScriptedDriver::new().on_script_seq(
            TAG_VIDEO_PLAYING,
            vec![json!(false), json!(false), json!(true)],
        );
        let hit = poll_until(
            &mut driver,
            &VideoPlaying,
            Duration::from_secs(10),
            Duration::from_millis(500),
        )
        .await;
        assert!(hit);
        assert_eq!(driver.count(DriverOp::Evaluate), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_gives_up_at_deadline() {
        let mut driver = ScriptedDriver::new().on_script(TAG_VIDEO_PLAYING, json!(false));
        let hit = poll_until(
            &mut driver,
            &VideoPlaying,
            Duration::from_secs(10),
            Duration::from_millis(500),
        )
        .await;
        assert!(!hit);
        // 0.0s .. 9.5s inclusive
        assert_eq!(driver.count(DriverOp::Evaluate), 20);
    }

    #[test]
    fn test_scripts_embed_escaped_arguments() {
        let script = SelectorListClick::new("fallbacks", COOKIE_BANNER_FALLBACKS).script();
        assert!(script.starts_with("/*click-selectors*/"));
        assert!(script.contains(r#"[".notification-dismiss","[aria-label=\"Dismiss notification\"]"]"#));

        let script = TextMatchClick::consent().script();
        assert!(script.contains("\"de acuerdo\""));
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!("clicked")));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(false)));
    }
}
