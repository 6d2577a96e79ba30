use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use serde::Serialize;
use serde_json::{Value, json};

use super::registry::{AppRegistry, AppSummary, SettingsUpdate};
use super::scheduler::FrameScheduler;
use super::storage::SettingsMap;
use crate::app::setting::AppSetting;
use crate::core::error::{MatrixError, MatrixResult};
use crate::device::MatrixDevice;
use crate::device::simulator::SimulatedDevice;

/// One line of the text control protocol.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlCommand {
    List,
    Activate(String),
    Settings(String),
    Set { id: String, key: String, value: Value },
    Status,
    Brightness(u8),
    Power(bool),
    Preview(PathBuf),
    Quit,
}

impl ControlCommand {
    /// Parses `verb [args...]`. The value of `set` is the remainder of the
    /// line read as JSON, falling back to a bare string.
    pub fn parse(line: &str) -> MatrixResult<Self> {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map(|(verb, rest)| (verb, rest.trim()))
            .unwrap_or((line, ""));

        let command = match verb.to_ascii_lowercase().as_str() {
            "list" | "ls" => Self::List,
            "activate" => Self::Activate(required(rest, "activate <id>")?),
            "settings" => Self::Settings(required(rest, "settings <id>")?),
            "set" => {
                let mut parts = rest.splitn(3, char::is_whitespace);
                let (Some(id), Some(key), Some(raw)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(usage("set <id> <key> <json>"));
                };
                let raw = raw.trim();
                let value = serde_json::from_str(raw)
                    .unwrap_or_else(|_| Value::String(raw.to_string()));
                Self::Set {
                    id: id.to_string(),
                    key: key.to_string(),
                    value,
                }
            }
            "status" => Self::Status,
            "brightness" => {
                let level = rest
                    .parse::<u8>()
                    .map_err(|_| usage("brightness <0-255>"))?;
                Self::Brightness(level)
            }
            "power" => match rest.to_ascii_lowercase().as_str() {
                "on" => Self::Power(true),
                "off" => Self::Power(false),
                _ => return Err(usage("power on|off")),
            },
            "preview" => {
                Self::Preview(PathBuf::from(required(rest, "preview <path>")?))
            }
            "quit" | "exit" => Self::Quit,
            "" => {
                return Err(MatrixError::Control("empty command".to_string()));
            }
            other => {
                return Err(MatrixError::Control(format!(
                    "unknown command '{}'",
                    other
                )));
            }
        };

        Ok(command)
    }
}

fn required(rest: &str, form: &str) -> MatrixResult<String> {
    if rest.is_empty() {
        Err(usage(form))
    } else {
        Ok(rest.to_string())
    }
}

fn usage(form: &str) -> MatrixError {
    MatrixError::Control(format!("usage: {}", form))
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppList {
    pub apps: Vec<AppSummary>,
    pub active_app: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationReply {
    pub success: bool,
    pub active_app: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsReply {
    pub app_id: String,
    pub settings: Vec<AppSetting>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub width: usize,
    pub height: usize,
    pub brightness: u8,
    pub fps: u32,
    pub average_fps: f32,
    pub running: bool,
    pub enabled: bool,
    pub active_app: Option<String>,
}

/// Thin glue between an outer control surface and the engine.
pub struct Controller {
    registry: Arc<AppRegistry>,
    scheduler: Arc<FrameScheduler>,
    device: Arc<dyn MatrixDevice>,
    preview: Option<Arc<SimulatedDevice>>,
}

impl Controller {
    pub fn new(
        registry: Arc<AppRegistry>,
        scheduler: Arc<FrameScheduler>,
        device: Arc<dyn MatrixDevice>,
    ) -> Self {
        Self {
            registry,
            scheduler,
            device,
            preview: None,
        }
    }

    /// Enables the `preview` command.
    pub fn with_preview(mut self, device: Arc<SimulatedDevice>) -> Self {
        self.preview = Some(device);
        self
    }

    pub fn list_apps(&self) -> AppList {
        AppList {
            apps: self.registry.apps(),
            active_app: self.registry.active_id(),
        }
    }

    pub async fn activate(&self, id: &str) -> MatrixResult<ActivationReply> {
        self.registry.activate(id).await?;
        Ok(ActivationReply {
            success: true,
            active_app: self.registry.active_id(),
        })
    }

    pub async fn settings(&self, id: &str) -> MatrixResult<SettingsReply> {
        let settings = self.registry.active_settings(id).await?;
        Ok(SettingsReply {
            app_id: id.to_string(),
            settings,
        })
    }

    pub async fn update_settings(
        &self,
        id: &str,
        updates: &SettingsMap,
    ) -> MatrixResult<SettingsUpdate> {
        self.registry.update_active_settings(id, updates).await
    }

    pub fn status(&self) -> DeviceStatus {
        let engine = self.scheduler.status();
        DeviceStatus {
            width: self.device.width(),
            height: self.device.height(),
            brightness: self.device.brightness(),
            fps: engine.target_fps,
            average_fps: engine.average_fps,
            running: engine.running,
            enabled: self.device.is_enabled(),
            active_app: self.registry.active_id(),
        }
    }

    pub fn set_brightness(&self, brightness: u8) -> DeviceStatus {
        info!("brightness set to {}", brightness);
        self.device.set_brightness(brightness);
        self.status()
    }

    pub fn set_power(&self, enabled: bool) -> DeviceStatus {
        info!("display powered {}", if enabled { "on" } else { "off" });
        self.device.set_enabled(enabled);
        self.status()
    }

    pub fn save_preview(&self, path: &Path) -> MatrixResult<Value> {
        let device = self.preview.as_ref().ok_or_else(|| {
            MatrixError::Control(
                "preview is not supported by this device".to_string(),
            )
        })?;
        device.save_png(path).map_err(|err| {
            MatrixError::Control(format!(
                "failed to write {}: {}",
                path.display(),
                err
            ))
        })?;
        Ok(json!({ "saved": path }))
    }

    /// Stops the render loop and deactivates whatever is active.
    pub async fn shutdown(&self) {
        self.scheduler.stop();
        self.registry.shutdown().await;
    }

    /// Runs one command and renders the reply as JSON. Failures become an
    /// `{"error": ...}` object rather than an `Err`.
    pub async fn execute(&self, command: ControlCommand) -> Value {
        let reply = match command {
            ControlCommand::List => Ok(to_json(self.list_apps())),
            ControlCommand::Activate(id) => {
                self.activate(&id).await.map(to_json)
            }
            ControlCommand::Settings(id) => {
                self.settings(&id).await.map(to_json)
            }
            ControlCommand::Set { id, key, value } => {
                let mut updates = SettingsMap::new();
                updates.insert(key, value);
                self.update_settings(&id, &updates).await.map(to_json)
            }
            ControlCommand::Status => Ok(to_json(self.status())),
            ControlCommand::Brightness(level) => {
                Ok(to_json(self.set_brightness(level)))
            }
            ControlCommand::Power(on) => Ok(to_json(self.set_power(on))),
            ControlCommand::Preview(path) => self.save_preview(&path),
            ControlCommand::Quit => {
                self.shutdown().await;
                Ok(json!({ "bye": true }))
            }
        };

        reply.unwrap_or_else(|err| json!({ "error": err.to_string() }))
    }
}

fn to_json<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|err| json!({ "error": err.to_string() }))
}
