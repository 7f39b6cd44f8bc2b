//! One browser, one capture

use std::fmt;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use wcap_core::{FrameSource, RawFrame};

use crate::strategy::{
    apply_first, banner_strategies, consent_strategies, element_present, fullscreen_strategies,
    play_strategies, poll_until, BodyClick, HoverPlayerCorner, Poller, Strategy, VideoPlaying,
    ViewportCenterClick, CONSENT_ROOT,
};
use crate::{BrowserDriver, BrowserLauncher, CaptureError, CaptureResult, SessionConfig};

/// Session steps, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    NavLoaded,
    BannerDismissed,
    ConsentResolved,
    PlayerFrameEntered,
    PlaybackStarted,
    PlayingConfirmed,
    FullscreenEntered,
    FrameCaptured,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NavLoaded => "nav_loaded",
            SessionState::BannerDismissed => "banner_dismissed",
            SessionState::ConsentResolved => "consent_resolved",
            SessionState::PlayerFrameEntered => "player_frame_entered",
            SessionState::PlaybackStarted => "playback_started",
            SessionState::PlayingConfirmed => "playing_confirmed",
            SessionState::FullscreenEntered => "fullscreen_entered",
            SessionState::FrameCaptured => "frame_captured",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step acted (names the heuristic that did)
    Done(String),
    /// Nothing to act on, or every heuristic failed; the session moved on
    Missed,
}

impl StepOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, StepOutcome::Done(_))
    }
}

/// Step-by-step record of one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    pub steps: Vec<(SessionState, StepOutcome)>,
}

impl SessionReport {
    fn record(&mut self, state: SessionState, outcome: StepOutcome) {
        match &outcome {
            StepOutcome::Done(how) => info!(state = %state, via = %how, "Session step done"),
            StepOutcome::Missed => info!(state = %state, "Session step missed"),
        }
        self.steps.push((state, outcome));
    }

    pub fn outcome(&self, state: SessionState) -> Option<&StepOutcome> {
        self.steps.iter().find(|(s, _)| *s == state).map(|(_, o)| o)
    }

    pub fn reached(&self, state: SessionState) -> bool {
        self.outcome(state).map(StepOutcome::is_done).unwrap_or(false)
    }
}

/// A successful session
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub frame: RawFrame,
    pub report: SessionReport,
}

/// Drives a fresh browser from page load to a screenshot.
///
/// The browser is closed exactly once on every exit path. Only a launch
/// failure, a navigation failure or a failed viewport screenshot make the
/// session fail; every other step degrades.
pub struct CaptureSession<'a> {
    launcher: &'a dyn BrowserLauncher,
    config: &'a SessionConfig,
}

impl<'a> CaptureSession<'a> {
    pub fn new(launcher: &'a dyn BrowserLauncher, config: &'a SessionConfig) -> Self {
        Self { launcher, config }
    }

    #[instrument(skip(self), fields(url = %self.config.target_url))]
    pub async fn run(&self) -> CaptureResult<CaptureOutcome> {
        let mut driver = self
            .launcher
            .launch(self.config)
            .await
            .map_err(CaptureError::Launch)?;

        let result = self.drive(driver.as_mut()).await;

        if let Err(e) = driver.close().await {
            warn!(error = %e, "Browser teardown failed");
        }

        match &result {
            Ok(outcome) => info!(
                source = ?outcome.frame.source,
                width = outcome.frame.width(),
                height = outcome.frame.height(),
                "Frame captured"
            ),
            Err(e) => error!(error = %e, "Capture session failed"),
        }
        result
    }

    async fn drive(&self, driver: &mut dyn BrowserDriver) -> CaptureResult<CaptureOutcome> {
        let timings = &self.config.timings;
        let mut report = SessionReport::default();

        driver
            .navigate(&self.config.target_url)
            .await
            .map_err(|source| CaptureError::Navigation {
                url: self.config.target_url.clone(),
                source,
            })?;
        sleep(timings.post_navigation).await;
        report.record(SessionState::NavLoaded, StepOutcome::Done(driver.name().to_string()));

        let banner = self.dismiss_banner(driver).await;
        report.record(SessionState::BannerDismissed, banner);

        let consent = self.resolve_consent(driver).await;
        report.record(SessionState::ConsentResolved, consent);

        let frame = self.enter_player_frame(driver).await;
        let in_frame = frame.is_done();
        report.record(SessionState::PlayerFrameEntered, frame);

        let playback = self.start_playback(driver).await;
        report.record(SessionState::PlaybackStarted, playback);

        let playing = if poll_until(
            driver,
            &VideoPlaying,
            timings.playing_deadline,
            timings.playing_poll,
        )
        .await
        {
            StepOutcome::Done(VideoPlaying.name().to_string())
        } else {
            StepOutcome::Missed
        };
        report.record(SessionState::PlayingConfirmed, playing);

        let fullscreen = self.enter_fullscreen(driver).await;
        report.record(SessionState::FullscreenEntered, fullscreen);

        let frame = self.capture_frame(driver, in_frame).await?;
        let how = match frame.source {
            FrameSource::PlayerElement => "player-element",
            FrameSource::Viewport => "viewport",
        };
        report.record(SessionState::FrameCaptured, StepOutcome::Done(how.to_string()));

        Ok(CaptureOutcome { frame, report })
    }

    async fn dismiss_banner(&self, driver: &mut dyn BrowserDriver) -> StepOutcome {
        let strategies = banner_strategies();
        match apply_first(&strategies, driver).await {
            Some(name) => {
                sleep(self.config.timings.banner_settle).await;
                StepOutcome::Done(name.to_string())
            }
            None => StepOutcome::Missed,
        }
    }

    /// Poll until a click clears the consent root, or the deadline passes.
    /// The dialog is injected after load, so an empty page keeps being
    /// polled. Multi-page consent flows take several clicks.
    async fn resolve_consent(&self, driver: &mut dyn BrowserDriver) -> StepOutcome {
        let timings = &self.config.timings;
        let strategies = consent_strategies();
        let mut poll = Poller::new(timings.consent_deadline, timings.consent_poll);
        let mut clicks = Vec::new();
        let mut root_seen = false;

        loop {
            if let Some(name) = apply_first(&strategies, driver).await {
                clicks.push(name.to_string());
                sleep(timings.consent_recheck).await;
                match element_present(driver, CONSENT_ROOT).await {
                    Ok(false) => return StepOutcome::Done(clicks.join(",")),
                    Ok(true) => {
                        root_seen = true;
                        debug!(clicks = clicks.len(), "Consent dialog still open");
                    }
                    Err(e) => {
                        debug!(error = %e, "Consent re-check failed");
                        return StepOutcome::Done(clicks.join(","));
                    }
                }
            } else {
                match element_present(driver, CONSENT_ROOT).await {
                    Ok(true) => root_seen = true,
                    Ok(false) if root_seen => {
                        debug!("Consent dialog went away");
                        return if clicks.is_empty() {
                            StepOutcome::Missed
                        } else {
                            StepOutcome::Done(clicks.join(","))
                        };
                    }
                    Ok(false) => {}
                    Err(e) => debug!(error = %e, "Consent check failed"),
                }
            }
            if !poll.wait().await {
                break;
            }
        }

        if clicks.is_empty() {
            StepOutcome::Missed
        } else {
            warn!(clicks = clicks.len(), "Consent dialog still open at deadline");
            StepOutcome::Done(clicks.join(","))
        }
    }

    async fn enter_player_frame(&self, driver: &mut dyn BrowserDriver) -> StepOutcome {
        let sources = match driver.frame_sources().await {
            Ok(sources) => sources,
            Err(e) => {
                warn!(error = %e, "Could not list frames");
                return StepOutcome::Missed;
            }
        };
        debug!(frames = sources.len(), "Embedded frames found");

        let Some(index) = sources.iter().position(|src| self.config.is_player_url(src)) else {
            info!(host = %self.config.player_host, "No player frame, staying on the page");
            return StepOutcome::Missed;
        };

        match driver.enter_frame(index).await {
            Ok(()) => {
                sleep(self.config.timings.frame_settle).await;
                StepOutcome::Done(sources[index].clone())
            }
            Err(e) => {
                warn!(index, error = %e, "Could not enter player frame");
                StepOutcome::Missed
            }
        }
    }

    /// Gesture clicks always run; the play tiers stop at the first hit
    async fn start_playback(&self, driver: &mut dyn BrowserDriver) -> StepOutcome {
        let timings = &self.config.timings;
        let gestures: [Box<dyn Strategy>; 2] = [
            Box::new(BodyClick),
            Box::new(ViewportCenterClick::new(
                self.config.viewport_width,
                self.config.viewport_height,
            )),
        ];
        for gesture in &gestures {
            match gesture.try_apply(driver).await {
                Ok(acted) => debug!(gesture = gesture.name(), acted, "Gesture click"),
                Err(e) => debug!(gesture = gesture.name(), error = %e, "Gesture click failed"),
            }
            sleep(timings.gesture_settle).await;
        }

        let strategies = play_strategies();
        match apply_first(&strategies, driver).await {
            Some(name) => {
                sleep(timings.play_settle).await;
                StepOutcome::Done(name.to_string())
            }
            None => StepOutcome::Missed,
        }
    }

    async fn enter_fullscreen(&self, driver: &mut dyn BrowserDriver) -> StepOutcome {
        let timings = &self.config.timings;
        match HoverPlayerCorner.try_apply(driver).await {
            Ok(true) => sleep(timings.hover_settle).await,
            Ok(false) => debug!("No player element to hover"),
            Err(e) => debug!(error = %e, "Hover failed"),
        }

        let strategies = fullscreen_strategies();
        let outcome = match apply_first(&strategies, driver).await {
            Some(name) => StepOutcome::Done(name.to_string()),
            None => StepOutcome::Missed,
        };
        sleep(timings.fullscreen_settle).await;
        outcome
    }

    /// Tight player screenshot when the frame was found, viewport otherwise
    async fn capture_frame(&self, driver: &mut dyn BrowserDriver, in_frame: bool) -> CaptureResult<RawFrame> {
        let timings = &self.config.timings;
        if let Err(e) = driver.leave_frame().await {
            debug!(error = %e, "Could not leave frame");
        }
        sleep(timings.pre_screenshot).await;

        if in_frame {
            let selector = self.config.player_frame_selector();
            let attempts = self.config.element_capture_attempts.max(1);
            for attempt in 1..=attempts {
                match driver.screenshot_element(&selector).await {
                    Ok(png) => match RawFrame::decode(&png, FrameSource::PlayerElement) {
                        Ok(frame) => return Ok(frame),
                        Err(e) => warn!(attempt, error = %e, "Player screenshot undecodable"),
                    },
                    Err(e) => warn!(attempt, error = %e, "Player screenshot failed"),
                }
                if attempt < attempts {
                    sleep(timings.capture_retry).await;
                }
            }
            warn!("Falling back to viewport screenshot");
        }

        let png = driver
            .screenshot_viewport()
            .await
            .map_err(CaptureError::Screenshot)?;
        Ok(RawFrame::decode(&png, FrameSource::Viewport)?)
    }
}

/// Run one session
pub async fn capture_once(
    launcher: &dyn BrowserLauncher,
    config: &SessionConfig,
) -> CaptureResult<CaptureOutcome> {
    CaptureSession::new(launcher, config).run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{
        TAG_CLICK_SELECTORS, TAG_CLICK_TEXT, TAG_ELEMENT_PRESENT, TAG_VIDEO_PLAYING,
    };
    use crate::{DriverCall, DriverOp, ScriptedDriver, ScriptedLauncher, SessionTimings};
    use serde_json::json;

    const PLAYER: &str = "https://g1.ipcamlive.com/player/player.php?alias=algar";

    fn config() -> SessionConfig {
        SessionConfig {
            timings: SessionTimings::instant(),
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_happy_path_captures_player_element() {
        let driver = ScriptedDriver::new()
            .with_frames(vec!["https://ads.example.com/", PLAYER])
            .on_script(TAG_CLICK_SELECTORS, json!("clicked"))
            .on_script(TAG_ELEMENT_PRESENT, json!(false))
            .on_script(TAG_VIDEO_PLAYING, json!(true));
        let launcher = ScriptedLauncher::new(driver.clone());

        let outcome = capture_once(&launcher, &config()).await.unwrap();

        assert_eq!(outcome.frame.source, FrameSource::PlayerElement);
        assert!(driver.calls().contains(&DriverCall::EnterFrame(1)));
        assert!(outcome.report.reached(SessionState::PlayerFrameEntered));
        assert!(outcome.report.reached(SessionState::PlayingConfirmed));
        assert!(outcome.report.reached(SessionState::ConsentResolved));
        assert_eq!(outcome.report.steps.len(), 8);
        assert_eq!(driver.close_count(), 1);
    }

    #[tokio::test]
    async fn test_every_miss_still_yields_a_frame() {
        let driver = ScriptedDriver::new();
        let launcher = ScriptedLauncher::new(driver.clone());

        let outcome = capture_once(&launcher, &config()).await.unwrap();

        assert_eq!(outcome.frame.source, FrameSource::Viewport);
        for state in [
            SessionState::BannerDismissed,
            SessionState::ConsentResolved,
            SessionState::PlayerFrameEntered,
            SessionState::PlaybackStarted,
            SessionState::PlayingConfirmed,
            SessionState::FullscreenEntered,
        ] {
            assert_eq!(outcome.report.outcome(state), Some(&StepOutcome::Missed), "{}", state);
        }
        assert_eq!(driver.count(DriverOp::ScreenshotElement), 0);
        assert_eq!(driver.close_count(), 1);
    }

    #[tokio::test]
    async fn test_states_run_in_order() {
        let launcher = ScriptedLauncher::new(ScriptedDriver::new());
        let outcome = capture_once(&launcher, &config()).await.unwrap();
        let order: Vec<SessionState> = outcome.report.steps.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            order,
            vec![
                SessionState::NavLoaded,
                SessionState::BannerDismissed,
                SessionState::ConsentResolved,
                SessionState::PlayerFrameEntered,
                SessionState::PlaybackStarted,
                SessionState::PlayingConfirmed,
                SessionState::FullscreenEntered,
                SessionState::FrameCaptured,
            ]
        );
    }

    #[tokio::test]
    async fn test_text_consent_used_when_selectors_miss() {
        let driver = ScriptedDriver::new()
            .on_script(TAG_CLICK_TEXT, json!("aceptar todo"))
            .on_script(TAG_ELEMENT_PRESENT, json!(false));
        let launcher = ScriptedLauncher::new(driver.clone());

        let outcome = capture_once(&launcher, &config()).await.unwrap();

        assert_eq!(
            outcome.report.outcome(SessionState::ConsentResolved),
            Some(&StepOutcome::Done("text-match".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_step_consent_clicks_until_root_is_gone() {
        let driver = ScriptedDriver::new()
            .on_script(TAG_CLICK_SELECTORS, json!("button.fc-cta-consent"))
            .on_script_seq(TAG_ELEMENT_PRESENT, vec![json!(true), json!(true), json!(false)]);
        let launcher = ScriptedLauncher::new(driver.clone());

        let outcome = capture_once(&launcher, &consent_timings()).await.unwrap();

        let consent = outcome.report.outcome(SessionState::ConsentResolved).unwrap();
        assert_eq!(
            consent,
            &StepOutcome::Done("consent-selectors,consent-selectors,consent-selectors".to_string())
        );
    }

    fn consent_timings() -> SessionConfig {
        SessionConfig {
            timings: SessionTimings {
                consent_deadline: std::time::Duration::from_secs(8),
                consent_poll: std::time::Duration::from_millis(250),
                ..SessionTimings::instant()
            },
            ..SessionConfig::default()
        }
    }

    fn evaluations(driver: &ScriptedDriver, tag: &str) -> usize {
        driver
            .calls()
            .iter()
            .filter(|c| matches!(c, DriverCall::Evaluate(t) if t == tag))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_consent_dialog_is_still_clicked() {
        // Two banner tiers miss, the first consent poll finds nothing, the
        // second finds the button
        let driver = ScriptedDriver::new()
            .on_script_seq(
                TAG_CLICK_SELECTORS,
                vec![json!(null), json!(null), json!(null), json!("button.fc-cta-consent")],
            )
            .on_script(TAG_ELEMENT_PRESENT, json!(false));
        let launcher = ScriptedLauncher::new(driver.clone());

        let outcome = capture_once(&launcher, &consent_timings()).await.unwrap();

        assert!(outcome.report.reached(SessionState::ConsentResolved));
        assert_eq!(
            outcome.report.outcome(SessionState::ConsentResolved),
            Some(&StepOutcome::Done("consent-selectors".to_string()))
        );
        assert_eq!(evaluations(&driver, TAG_ELEMENT_PRESENT), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consent_without_dialog_polls_until_deadline() {
        let driver = ScriptedDriver::new().on_script(TAG_ELEMENT_PRESENT, json!(false));
        let launcher = ScriptedLauncher::new(driver.clone());
        let started = tokio::time::Instant::now();

        let outcome = capture_once(&launcher, &consent_timings()).await.unwrap();

        assert_eq!(outcome.report.outcome(SessionState::ConsentResolved), Some(&StepOutcome::Missed));
        assert!(started.elapsed() >= std::time::Duration::from_millis(7750));
        assert!(evaluations(&driver, TAG_ELEMENT_PRESENT) > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consent_stops_when_dialog_goes_away_unclicked() {
        let driver = ScriptedDriver::new()
            .on_script_seq(TAG_ELEMENT_PRESENT, vec![json!(true), json!(false)]);
        let launcher = ScriptedLauncher::new(driver.clone());
        let started = tokio::time::Instant::now();

        let outcome = capture_once(&launcher, &consent_timings()).await.unwrap();

        assert_eq!(outcome.report.outcome(SessionState::ConsentResolved), Some(&StepOutcome::Missed));
        assert_eq!(evaluations(&driver, TAG_ELEMENT_PRESENT), 2);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_element_capture_retries_then_falls_back() {
        let driver = ScriptedDriver::new()
            .with_frames(vec![PLAYER])
            .fail_always(DriverOp::ScreenshotElement);
        let launcher = ScriptedLauncher::new(driver.clone());

        let outcome = capture_once(&launcher, &config()).await.unwrap();

        assert_eq!(outcome.frame.source, FrameSource::Viewport);
        assert_eq!(driver.count(DriverOp::ScreenshotElement), 2);
        assert_eq!(driver.close_count(), 1);
    }

    #[tokio::test]
    async fn test_element_capture_recovers_on_retry() {
        let driver = ScriptedDriver::new()
            .with_frames(vec![PLAYER])
            .fail_times(DriverOp::ScreenshotElement, 1);
        let launcher = ScriptedLauncher::new(driver.clone());

        let outcome = capture_once(&launcher, &config()).await.unwrap();

        assert_eq!(outcome.frame.source, FrameSource::PlayerElement);
        assert_eq!(driver.count(DriverOp::ScreenshotViewport), 0);
    }

    #[tokio::test]
    async fn test_launch_failure_is_an_error() {
        let launcher = ScriptedLauncher::failing();
        let err = capture_once(&launcher, &config()).await.unwrap_err();
        assert!(matches!(err, CaptureError::Launch(_)));
        assert_eq!(launcher.launches(), 1);
    }
}
