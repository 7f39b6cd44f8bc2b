//! In-process browser double
//!
//! Answers scripts from a rule table keyed by script tag, records every
//! call, and can fail any operation on demand. Clones share state, so a
//! test can keep a handle while the session owns the boxed driver.

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{BrowserDriver, BrowserLauncher, DriverError, DriverResult, SessionConfig};

/// Operation kinds, for failure injection and counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    Navigate,
    Evaluate,
    FrameSources,
    EnterFrame,
    LeaveFrame,
    ClickAt,
    MoveMouse,
    ScreenshotElement,
    ScreenshotViewport,
    Close,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Navigate(String),
    /// Script tag, or the whole script when untagged
    Evaluate(String),
    FrameSources,
    EnterFrame(usize),
    LeaveFrame,
    ClickAt(f64, f64),
    MoveMouse(f64, f64),
    ScreenshotElement(String),
    ScreenshotViewport,
    Close,
}

impl DriverCall {
    pub fn op(&self) -> DriverOp {
        match self {
            DriverCall::Navigate(_) => DriverOp::Navigate,
            DriverCall::Evaluate(_) => DriverOp::Evaluate,
            DriverCall::FrameSources => DriverOp::FrameSources,
            DriverCall::EnterFrame(_) => DriverOp::EnterFrame,
            DriverCall::LeaveFrame => DriverOp::LeaveFrame,
            DriverCall::ClickAt(..) => DriverOp::ClickAt,
            DriverCall::MoveMouse(..) => DriverOp::MoveMouse,
            DriverCall::ScreenshotElement(_) => DriverOp::ScreenshotElement,
            DriverCall::ScreenshotViewport => DriverOp::ScreenshotViewport,
            DriverCall::Close => DriverOp::Close,
        }
    }
}

/// Remaining injected failures for an operation
#[derive(Debug, Clone, Copy)]
enum Failure {
    Always,
    Times(u32),
}

#[derive(Debug, Default)]
struct ScriptState {
    rules: HashMap<String, VecDeque<Value>>,
    frames: Vec<String>,
    failures: HashMap<DriverOp, Failure>,
    calls: Vec<DriverCall>,
    element_png: Vec<u8>,
    viewport_png: Vec<u8>,
    closed: bool,
}

/// Scripted [`BrowserDriver`]
#[derive(Debug, Clone)]
pub struct ScriptedDriver {
    state: Arc<Mutex<ScriptState>>,
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a solid PNG; used for the default screenshots
pub fn solid_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)));
    let mut buf = Cursor::new(Vec::new());
    match image.write_to(&mut buf, ImageFormat::Png) {
        Ok(()) => buf.into_inner(),
        Err(_) => Vec::new(),
    }
}

/// Default element screenshot size
pub const SCRIPTED_ELEMENT_SIZE: (u32, u32) = (32, 18);
/// Default viewport screenshot size
pub const SCRIPTED_VIEWPORT_SIZE: (u32, u32) = (64, 36);

fn script_tag(script: &str) -> &str {
    script
        .strip_prefix("/*")
        .and_then(|rest| rest.split_once("*/"))
        .map(|(tag, _)| tag)
        .unwrap_or(script)
}

impl ScriptedDriver {
    pub fn new() -> Self {
        let state = ScriptState {
            element_png: solid_png(SCRIPTED_ELEMENT_SIZE.0, SCRIPTED_ELEMENT_SIZE.1, [200, 200, 200, 255]),
            viewport_png: solid_png(SCRIPTED_VIEWPORT_SIZE.0, SCRIPTED_VIEWPORT_SIZE.1, [40, 40, 40, 255]),
            ..ScriptState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Scripts tagged `tag` evaluate to `value`
    pub fn on_script(self, tag: &str, value: Value) -> Self {
        self.on_script_seq(tag, vec![value])
    }

    /// Scripts tagged `tag` evaluate to `values` in turn; the last repeats
    pub fn on_script_seq(self, tag: &str, values: Vec<Value>) -> Self {
        self.lock().rules.insert(tag.to_string(), values.into());
        self
    }

    pub fn with_frames<S: Into<String>>(self, frames: Vec<S>) -> Self {
        self.lock().frames = frames.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_element_png(self, png: Vec<u8>) -> Self {
        self.lock().element_png = png;
        self
    }

    pub fn with_viewport_png(self, png: Vec<u8>) -> Self {
        self.lock().viewport_png = png;
        self
    }

    pub fn fail_always(self, op: DriverOp) -> Self {
        self.lock().failures.insert(op, Failure::Always);
        self
    }

    /// Fail the next `times` calls of `op`
    pub fn fail_times(self, op: DriverOp, times: u32) -> Self {
        self.lock().failures.insert(op, Failure::Times(times));
        self
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: DriverOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn close_count(&self) -> usize {
        self.count(DriverOp::Close)
    }

    /// Whether a script with this tag was evaluated
    pub fn ran_script(&self, tag: &str) -> bool {
        self.lock()
            .calls
            .iter()
            .any(|c| matches!(c, DriverCall::Evaluate(t) if t == tag))
    }

    /// Record the call, then apply any injected failure
    fn enter(&self, call: DriverCall) -> DriverResult<MutexGuard<'_, ScriptState>> {
        let op = call.op();
        let mut state = self.lock();
        state.calls.push(call);
        if state.closed && op != DriverOp::Close {
            return Err(DriverError::Closed);
        }
        match state.failures.get(&op).copied() {
            Some(Failure::Always) => Err(DriverError::Script(format!("injected {:?} failure", op))),
            Some(Failure::Times(n)) if n > 0 => {
                state.failures.insert(op, Failure::Times(n - 1));
                Err(DriverError::Script(format!("injected {:?} failure", op)))
            }
            _ => Ok(state),
        }
    }
}

#[async_trait::async_trait]
impl BrowserDriver for ScriptedDriver {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.enter(DriverCall::Navigate(url.to_string()))?;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> DriverResult<Value> {
        let mut state = self.enter(DriverCall::Evaluate(script_tag(script).to_string()))?;
        let Some(queue) = state.rules.get_mut(script_tag(script)) else {
            return Ok(Value::Null);
        };
        let value = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(value.unwrap_or(Value::Null))
    }

    async fn frame_sources(&mut self) -> DriverResult<Vec<String>> {
        let state = self.enter(DriverCall::FrameSources)?;
        Ok(state.frames.clone())
    }

    async fn enter_frame(&mut self, index: usize) -> DriverResult<()> {
        let state = self.enter(DriverCall::EnterFrame(index))?;
        if index >= state.frames.len() {
            return Err(DriverError::NoFrame(index));
        }
        Ok(())
    }

    async fn leave_frame(&mut self) -> DriverResult<()> {
        self.enter(DriverCall::LeaveFrame)?;
        Ok(())
    }

    async fn click_at(&mut self, x: f64, y: f64) -> DriverResult<()> {
        self.enter(DriverCall::ClickAt(x, y))?;
        Ok(())
    }

    async fn move_mouse(&mut self, x: f64, y: f64) -> DriverResult<()> {
        self.enter(DriverCall::MoveMouse(x, y))?;
        Ok(())
    }

    async fn screenshot_element(&mut self, selector: &str) -> DriverResult<Vec<u8>> {
        let state = self.enter(DriverCall::ScreenshotElement(selector.to_string()))?;
        Ok(state.element_png.clone())
    }

    async fn screenshot_viewport(&mut self) -> DriverResult<Vec<u8>> {
        let state = self.enter(DriverCall::ScreenshotViewport)?;
        Ok(state.viewport_png.clone())
    }

    async fn close(&mut self) -> DriverResult<()> {
        let mut state = self.enter(DriverCall::Close)?;
        state.closed = true;
        Ok(())
    }
}

/// Hands out clones of one [`ScriptedDriver`]
#[derive(Debug, Clone, Default)]
pub struct ScriptedLauncher {
    driver: ScriptedDriver,
    fail: bool,
    launches: Arc<Mutex<usize>>,
}

impl ScriptedLauncher {
    pub fn new(driver: ScriptedDriver) -> Self {
        Self {
            driver,
            fail: false,
            launches: Arc::new(Mutex::new(0)),
        }
    }

    /// A launcher that can never start a browser
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn driver(&self) -> &ScriptedDriver {
        &self.driver
    }

    pub fn launches(&self) -> usize {
        *self.launches.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self, _config: &SessionConfig) -> DriverResult<Box<dyn BrowserDriver>> {
        *self.launches.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
        if self.fail {
            return Err(DriverError::Launch("scripted launch failure".to_string()));
        }
        Ok(Box::new(self.driver.clone()))
    }
}
