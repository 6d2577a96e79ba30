use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use super::cancel::CancelToken;
use super::lifecycle::AppLifecycle;
use super::setting::AppSetting;
use crate::core::error::AppError;
use crate::render::frame_buffer::PixelBuffer;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Dimensions {
    pub width: usize,
    pub height: usize,
}

impl Dimensions {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

/// Static identity of an app type; the registry catalogs these.
#[derive(Debug)]
pub struct AppDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub frame_rate: u32,
}

/// External configuration handed to every app on activation.
pub type AppConfig = Map<String, Value>;

pub type AppFactory =
    Arc<dyn Fn() -> Result<Box<dyn MatrixApp>, AppError> + Send + Sync>;

/// Contract every pluggable visual program implements.
///
/// The lifecycle is `activate -> (update -> render)* -> deactivate`. A fresh
/// instance is built for every activation. `update` and `render` run on the
/// scheduler's tick and must not block; any I/O belongs in a background job
/// spawned through [`AppLifecycle::run_in_background`]. `render` takes
/// `&self`: state flows from update to render, never back.
#[async_trait]
pub trait MatrixApp: Send {
    fn descriptor(&self) -> &'static AppDescriptor;

    fn id(&self) -> &str {
        self.descriptor().id
    }

    fn name(&self) -> &str {
        self.descriptor().name
    }

    /// Re-read by the scheduler every tick.
    fn frame_rate(&self) -> u32 {
        self.descriptor().frame_rate
    }

    /// Apps that spawn background work expose their lifecycle so the default
    /// `deactivate` can drain it.
    fn lifecycle(&self) -> Option<&AppLifecycle> {
        None
    }

    /// Whether switching to this app should slide the previous frame out.
    fn wants_transition(&self) -> bool {
        true
    }

    async fn activate(
        &mut self,
        _dimensions: Dimensions,
        _config: &AppConfig,
    ) -> Result<(), AppError> {
        Ok(())
    }

    async fn deactivate(
        &mut self,
        _cancel: CancelToken,
    ) -> Result<(), AppError> {
        if let Some(lifecycle) = self.lifecycle() {
            lifecycle.shutdown().await;
        }
        Ok(())
    }

    fn update(&mut self, delta: Duration) -> Result<(), AppError>;

    fn render(&self, frame: &mut PixelBuffer) -> Result<(), AppError>;

    fn settings(&self) -> Vec<AppSetting> {
        Vec::new()
    }

    fn update_setting(
        &mut self,
        key: &str,
        _value: &Value,
    ) -> Result<(), AppError> {
        Err(AppError::UnknownSetting(key.to_string()))
    }

    fn has_settings(&self) -> bool {
        !self.settings().is_empty()
    }
}
