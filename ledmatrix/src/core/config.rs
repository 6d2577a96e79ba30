use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{MatrixError, MatrixResult};
use crate::runtime::storage;

pub const CONFIG_VERSION: &str = "1";
pub const DEFAULT_FPS: u32 = 60;
pub const DEFAULT_TRANSITION_SPEED: usize = 8;
pub const DEFAULT_BACKGROUND_GRACE: Duration = Duration::from_millis(50);

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MatrixConfig {
    pub version: String,
    pub width: usize,
    pub height: usize,
    pub brightness: u8,
    pub default_fps: u32,
    pub transition_speed: usize,
    pub transitions_enabled: bool,
    pub deactivate_timeout_ms: u64,
    pub initial_app: String,
    pub settings_path: Option<PathBuf>,
    /// Passed verbatim to every app's `activate`.
    pub apps: Map<String, Value>,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            width: 254,
            height: 64,
            brightness: 100,
            default_fps: DEFAULT_FPS,
            transition_speed: DEFAULT_TRANSITION_SPEED,
            transitions_enabled: true,
            deactivate_timeout_ms: 2000,
            initial_app: "clock".to_string(),
            settings_path: None,
            apps: Map::new(),
        }
    }
}

impl MatrixConfig {
    pub fn default_path() -> Option<PathBuf> {
        storage::config_dir().map(|dir| dir.join("config.json"))
    }

    /// Loads a config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> MatrixResult<Self> {
        let path = path.as_ref();
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(MatrixError::Config(format!(
                    "failed to read {}: {}",
                    path.display(),
                    err
                )));
            }
        };

        let config = serde_json::from_str::<Self>(&json).map_err(|err| {
            MatrixError::Config(format!(
                "failed to parse {}: {}",
                path.display(),
                err
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> MatrixResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| MatrixError::Config(err.to_string()))?;
        if let Some(parent_dir) = path.parent() {
            fs::create_dir_all(parent_dir)
                .map_err(|err| MatrixError::Config(err.to_string()))?;
        }
        fs::write(path, json)
            .map_err(|err| MatrixError::Config(err.to_string()))
    }

    pub fn validate(&self) -> MatrixResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MatrixError::Config(format!(
                "display dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.default_fps == 0 {
            return Err(MatrixError::Config(
                "default_fps must be positive".to_string(),
            ));
        }
        if self.transition_speed == 0 {
            return Err(MatrixError::Config(
                "transition_speed must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn settings_path(&self) -> Option<PathBuf> {
        self.settings_path
            .clone()
            .or_else(|| {
                storage::config_dir().map(|d| d.join("app-settings.json"))
            })
    }

    pub fn deactivate_timeout(&self) -> Duration {
        Duration::from_millis(self.deactivate_timeout_ms)
    }
}
