use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use directories_next::BaseDirs;
use log::debug;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::core::error::MatrixError;
use crate::core::logging::report_failure;

pub type SettingsMap = Map<String, Value>;

pub fn config_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|base| base.config_dir().join("LedMatrix"))
}

/// Persists per-app settings so they survive switching between apps.
///
/// The file is one JSON object keyed by app id, each value a flat
/// key/value map. Missing or malformed files load as "no saved settings";
/// read and write failures are reported and never fatal.
#[derive(Debug)]
pub struct AppSettingsStorage {
    path: PathBuf,
    cache: Mutex<BTreeMap<String, SettingsMap>>,
}

impl AppSettingsStorage {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = load_from_disk(&path);
        debug!(
            "loaded saved settings for {} app(s) from {}",
            cache.len(),
            path.display()
        );

        Self {
            path,
            cache: Mutex::new(cache),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save_app_settings(&self, app_id: &str, settings: SettingsMap) {
        let mut cache = self.cache.lock();
        cache.insert(app_id.to_string(), settings);
        persist_to_disk(&self.path, &cache);
    }

    pub fn app_settings(&self, app_id: &str) -> Option<SettingsMap> {
        self.cache.lock().get(app_id).cloned()
    }

    pub fn update_app_setting(&self, app_id: &str, key: &str, value: Value) {
        let mut cache = self.cache.lock();
        cache
            .entry(app_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        persist_to_disk(&self.path, &cache);
    }
}

fn load_from_disk(path: &Path) -> BTreeMap<String, SettingsMap> {
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return BTreeMap::new();
        }
        Err(err) => {
            report_failure(&MatrixError::Persistence(format!(
                "failed to read {}: {}",
                path.display(),
                err
            )));
            return BTreeMap::new();
        }
    };

    match serde_json::from_str::<BTreeMap<String, SettingsMap>>(&json) {
        Ok(settings) => settings,
        Err(err) => {
            report_failure(&MatrixError::Persistence(format!(
                "ignoring malformed settings file {}: {}",
                path.display(),
                err
            )));
            BTreeMap::new()
        }
    }
}

fn persist_to_disk(path: &Path, settings: &BTreeMap<String, SettingsMap>) {
    let result = serde_json::to_string_pretty(settings)
        .map_err(|err| err.to_string())
        .and_then(|json| {
            if let Some(parent_dir) = path.parent() {
                fs::create_dir_all(parent_dir).map_err(|err| err.to_string())?;
            }
            fs::write(path, json).map_err(|err| err.to_string())
        });

    if let Err(err) = result {
        report_failure(&MatrixError::Persistence(format!(
            "failed to save {}: {}",
            path.display(),
            err
        )));
    }
}
