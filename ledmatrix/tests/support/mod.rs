#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use ledmatrix::core::logging::{clear_failure_hook, set_failure_hook};
use ledmatrix::prelude::*;

pub static ALPHA: AppDescriptor = AppDescriptor {
    id: "alpha",
    name: "Alpha",
    frame_rate: 10,
};

pub static BETA: AppDescriptor = AppDescriptor {
    id: "beta",
    name: "Beta",
    frame_rate: 30,
};

pub static GAMMA: AppDescriptor = AppDescriptor {
    id: "gamma",
    name: "Gamma",
    frame_rate: 60,
};

pub const ALPHA_COLOR: Pixel = Pixel::new(255, 0, 0);
pub const BETA_COLOR: Pixel = Pixel::new(0, 0, 255);

/// Ordered record of lifecycle calls across app instances.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

/// What a [`ScriptedApp`] does at each lifecycle point.
#[derive(Clone)]
pub struct Script {
    pub color: Pixel,
    pub fail_factory: bool,
    pub fail_activate: bool,
    pub activate_delay: Option<Duration>,
    /// Deactivate waits for its token instead of returning.
    pub hang_deactivate: bool,
    pub fail_update: bool,
    pub fail_render: bool,
    pub panic_render: bool,
    pub panic_deactivate: bool,
    /// Spawns a job that exits as soon as it is cancelled.
    pub cooperative_job: bool,
    /// Spawns a job that ignores cancellation for this long, then fails.
    pub stubborn_job: Option<Duration>,
    /// Shared override for the rate the app reports each tick.
    pub frame_rate: Option<Arc<AtomicU32>>,
    pub settable: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            color: ALPHA_COLOR,
            fail_factory: false,
            fail_activate: false,
            activate_delay: None,
            hang_deactivate: false,
            fail_update: false,
            fail_render: false,
            panic_render: false,
            panic_deactivate: false,
            cooperative_job: false,
            stubborn_job: None,
            frame_rate: None,
            settable: false,
        }
    }
}

pub struct ScriptedApp {
    descriptor: &'static AppDescriptor,
    script: Script,
    journal: Journal,
    lifecycle: AppLifecycle,
    level: i64,
    ticks: u64,
}

impl ScriptedApp {
    pub fn new(
        descriptor: &'static AppDescriptor,
        script: Script,
        journal: Journal,
    ) -> Self {
        Self {
            descriptor,
            lifecycle: AppLifecycle::new(descriptor.id),
            script,
            journal,
            level: 1,
            ticks: 0,
        }
    }

    fn note(&self, what: &str) {
        self.journal.record(format!("{}:{}", self.descriptor.id, what));
    }
}

#[async_trait]
impl MatrixApp for ScriptedApp {
    fn descriptor(&self) -> &'static AppDescriptor {
        self.descriptor
    }

    fn frame_rate(&self) -> u32 {
        self.script
            .frame_rate
            .as_ref()
            .map(|rate| rate.load(Ordering::Relaxed))
            .unwrap_or(self.descriptor.frame_rate)
    }

    fn lifecycle(&self) -> Option<&AppLifecycle> {
        Some(&self.lifecycle)
    }

    async fn activate(
        &mut self,
        _dimensions: Dimensions,
        _config: &AppConfig,
    ) -> Result<(), AppError> {
        self.note("activate");

        if self.script.cooperative_job {
            let journal = self.journal.clone();
            let id = self.descriptor.id;
            self.lifecycle.run_in_background(move |cancel| async move {
                cancel.cancelled().await;
                journal.record(format!("{}:job-cancelled", id));
                Ok(())
            });
        }

        if let Some(stall) = self.script.stubborn_job {
            self.lifecycle.run_in_background(move |_cancel| async move {
                tokio::time::sleep(stall).await;
                Err(AppError::msg("stubborn job gave up"))
            });
        }

        if let Some(delay) = self.script.activate_delay {
            tokio::time::sleep(delay).await;
        }

        if self.script.fail_activate {
            return Err(AppError::msg("activation refused"));
        }
        self.note("activated");
        Ok(())
    }

    async fn deactivate(
        &mut self,
        cancel: CancelToken,
    ) -> Result<(), AppError> {
        self.note("deactivate");
        if self.script.panic_deactivate {
            panic!("deactivate exploded");
        }
        if self.script.hang_deactivate {
            cancel.cancelled().await;
            self.note("deactivate-cancelled");
        }
        self.lifecycle.shutdown().await;
        self.note("deactivated");
        Ok(())
    }

    fn update(&mut self, _delta: Duration) -> Result<(), AppError> {
        self.ticks += 1;
        if self.script.fail_update {
            return Err(AppError::msg("update failed"));
        }
        Ok(())
    }

    fn render(&self, frame: &mut PixelBuffer) -> Result<(), AppError> {
        if self.script.panic_render {
            panic!("render exploded");
        }
        // Leave a partial write behind before failing.
        frame.set_pixel(0, 0, Pixel::WHITE);
        if self.script.fail_render {
            return Err(AppError::msg("render failed"));
        }
        frame.clear(self.script.color);
        self.journal.record(format!("{}:render", self.descriptor.id));
        Ok(())
    }

    fn settings(&self) -> Vec<AppSetting> {
        if !self.script.settable {
            return Vec::new();
        }
        vec![
            AppSetting::new(
                "level",
                "Level",
                SettingKind::Integer,
                1,
                self.level,
            )
            .range(0, 10),
        ]
    }

    fn update_setting(
        &mut self,
        key: &str,
        value: &Value,
    ) -> Result<(), AppError> {
        match key {
            "level" if self.script.settable => {
                self.level = as_integer(key, value, 0, 10)?;
                Ok(())
            }
            _ => Err(AppError::UnknownSetting(key.to_string())),
        }
    }
}

pub fn register(
    registry: &AppRegistry,
    descriptor: &'static AppDescriptor,
    script: Script,
    journal: &Journal,
) {
    let journal = journal.clone();
    registry.register(descriptor, move || {
        if script.fail_factory {
            return Err(AppError::msg("factory refused"));
        }
        Ok(Box::new(ScriptedApp::new(
            descriptor,
            script.clone(),
            journal.clone(),
        )))
    });
}

pub fn registry(width: usize, height: usize) -> AppRegistry {
    AppRegistry::new(Dimensions::new(width, height))
        .with_deactivate_timeout(Duration::from_millis(500))
}

/// Collects every error passed to the failure seam while alive.
pub struct FailureLog {
    seen: Arc<Mutex<Vec<String>>>,
}

impl FailureLog {
    pub fn install() -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        set_failure_hook(move |err| sink.lock().push(err.to_string()));
        Self { seen }
    }

    pub fn messages(&self) -> Vec<String> {
        self.seen.lock().clone()
    }

    pub fn mentioning(&self, needle: &str) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|message| message.contains(needle))
            .collect()
    }
}

impl Drop for FailureLog {
    fn drop(&mut self) {
        clear_failure_hook();
    }
}

/// Simulated device that also timestamps every presented frame.
pub struct TimedDevice {
    inner: SimulatedDevice,
    stamps: Mutex<Vec<Instant>>,
}

impl TimedDevice {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            inner: SimulatedDevice::new(width, height),
            stamps: Mutex::new(Vec::new()),
        }
    }

    pub fn stamps(&self) -> Vec<Instant> {
        self.stamps.lock().clone()
    }

    pub fn canvas(&self) -> PixelBuffer {
        self.inner.canvas()
    }
}

impl MatrixDevice for TimedDevice {
    fn width(&self) -> usize {
        self.inner.width()
    }

    fn height(&self) -> usize {
        self.inner.height()
    }

    fn brightness(&self) -> u8 {
        self.inner.brightness()
    }

    fn set_brightness(&self, brightness: u8) {
        self.inner.set_brightness(brightness);
    }

    fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.inner.set_enabled(enabled);
    }

    fn present(&self, frame: &PixelBuffer) {
        self.stamps.lock().push(Instant::now());
        self.inner.present(frame);
    }
}

/// Mean gap between consecutive stamps taken at or after `from`.
pub fn mean_interval(stamps: &[Instant], from: Instant) -> Option<Duration> {
    let window: Vec<_> =
        stamps.iter().copied().filter(|s| *s >= from).collect();
    if window.len() < 2 {
        return None;
    }
    let span = window[window.len() - 1] - window[0];
    Some(span / (window.len() - 1) as u32)
}
