use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio::task::{JoinError, JoinHandle};

use super::events::{EventListener, RuntimeEvent};
use super::storage::{AppSettingsStorage, SettingsMap};
use crate::app::application::{
    AppConfig, AppDescriptor, AppFactory, Dimensions, MatrixApp,
};
use crate::app::cancel::CancelScope;
use crate::app::setting::AppSetting;
use crate::core::error::{AppError, LifecycleStage, MatrixError, MatrixResult};
use crate::core::logging::report_failure;
use crate::core::util::{HashMap, catch_panic, normalize_id, panic_message};

const DEFAULT_DEACTIVATE_TIMEOUT: Duration = Duration::from_secs(2);

struct CatalogEntry {
    descriptor: &'static AppDescriptor,
    factory: AppFactory,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSummary {
    pub id: String,
    pub name: String,
    pub frame_rate: u32,
    pub has_settings: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SettingsUpdate {
    pub applied: Vec<String>,
    pub rejected: BTreeMap<String, String>,
}

/// The app instance currently receiving ticks.
///
/// The scheduler only ever `try_lock`s the instance; the async lifecycle
/// calls lock and wait.
pub struct ActiveApp {
    id: String,
    name: String,
    frame_rate: AtomicU32,
    retired: AtomicBool,
    app: AsyncMutex<Box<dyn MatrixApp>>,
}

impl ActiveApp {
    fn new(app: Box<dyn MatrixApp>) -> Self {
        Self {
            id: app.id().to_string(),
            name: app.name().to_string(),
            frame_rate: AtomicU32::new(app.frame_rate().max(1)),
            retired: AtomicBool::new(false),
            app: AsyncMutex::new(app),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last rate the app reported, refreshed every tick.
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate.load(Ordering::Relaxed)
    }

    pub(crate) fn set_frame_rate(&self, fps: u32) {
        self.frame_rate.store(fps.max(1), Ordering::Relaxed);
    }

    /// True once teardown has begun; the scheduler stops ticking it.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub async fn lock(&self) -> AsyncMutexGuard<'_, Box<dyn MatrixApp>> {
        self.app.lock().await
    }

    pub fn try_lock(
        &self,
    ) -> Option<AsyncMutexGuard<'_, Box<dyn MatrixApp>>> {
        self.app.try_lock().ok()
    }
}

/// Everything a switch touches once it has begun. A clone travels to the
/// task that performs the switch, so the switch completes even when the
/// caller stops waiting for it.
#[derive(Clone)]
struct Switchboard {
    active: Arc<RwLock<Option<Arc<ActiveApp>>>>,
    listeners: Arc<RwLock<Vec<EventListener>>>,
    dimensions: Dimensions,
    config: AppConfig,
    storage: Option<Arc<AppSettingsStorage>>,
    deactivate_timeout: Duration,
}

/// Catalog of app factories plus the single active instance.
///
/// Every switch goes through [`activate`](Self::activate), which is
/// serialized. Readers only get `Arc` snapshots of the active app.
pub struct AppRegistry {
    catalog: RwLock<IndexMap<String, CatalogEntry>>,
    has_settings: RwLock<HashMap<String, bool>>,
    switching: Arc<AsyncMutex<()>>,
    board: Switchboard,
}

impl AppRegistry {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            catalog: RwLock::new(IndexMap::new()),
            has_settings: RwLock::new(HashMap::default()),
            switching: Arc::new(AsyncMutex::new(())),
            board: Switchboard {
                active: Arc::new(RwLock::new(None)),
                listeners: Arc::new(RwLock::new(Vec::new())),
                dimensions,
                config: AppConfig::new(),
                storage: None,
                deactivate_timeout: DEFAULT_DEACTIVATE_TIMEOUT,
            },
        }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.board.config = config;
        self
    }

    pub fn with_storage(mut self, storage: Arc<AppSettingsStorage>) -> Self {
        self.board.storage = Some(storage);
        self
    }

    pub fn with_deactivate_timeout(mut self, timeout: Duration) -> Self {
        self.board.deactivate_timeout = timeout;
        self
    }

    pub fn dimensions(&self) -> Dimensions {
        self.board.dimensions
    }

    /// Re-registering an id replaces the previous entry.
    pub fn register<F>(&self, descriptor: &'static AppDescriptor, factory: F)
    where
        F: Fn() -> Result<Box<dyn MatrixApp>, AppError>
            + Send
            + Sync
            + 'static,
    {
        let key = normalize_id(descriptor.id);
        let entry = CatalogEntry {
            descriptor,
            factory: Arc::new(factory),
        };

        self.has_settings.write().remove(&key);
        if self.catalog.write().insert(key, entry).is_some() {
            debug!("replaced registration for app '{}'", descriptor.id);
        }
    }

    pub fn register_all(
        &self,
        entries: impl IntoIterator<Item = (&'static AppDescriptor, AppFactory)>,
    ) {
        for (descriptor, factory) in entries {
            self.register(descriptor, move || factory());
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.catalog.read().contains_key(&normalize_id(id))
    }

    pub fn len(&self) -> usize {
        self.catalog.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.read().is_empty()
    }

    pub fn descriptor(&self, id: &str) -> Option<&'static AppDescriptor> {
        self.catalog
            .read()
            .get(&normalize_id(id))
            .map(|entry| entry.descriptor)
    }

    /// Catalog in registration order. `has_settings` is probed once per
    /// registration by building a throwaway instance.
    pub fn apps(&self) -> Vec<AppSummary> {
        let catalog = self.catalog.read();
        catalog
            .iter()
            .map(|(key, entry)| AppSummary {
                id: entry.descriptor.id.to_string(),
                name: entry.descriptor.name.to_string(),
                frame_rate: entry.descriptor.frame_rate,
                has_settings: self.probe_settings(key, entry),
            })
            .collect()
    }

    fn probe_settings(&self, key: &str, entry: &CatalogEntry) -> bool {
        if let Some(known) = self.has_settings.read().get(key) {
            return *known;
        }

        let has_settings = catch_panic(|| (entry.factory)())
            .map(|app| app.has_settings())
            .unwrap_or(false);
        self.has_settings
            .write()
            .insert(key.to_string(), has_settings);
        has_settings
    }

    pub fn active(&self) -> Option<Arc<ActiveApp>> {
        self.board.active.read().clone()
    }

    pub fn active_id(&self) -> Option<String> {
        self.board
            .active
            .read()
            .as_ref()
            .map(|app| app.id().to_string())
    }

    pub fn subscribe(&self, listener: EventListener) {
        self.board.listeners.write().push(listener);
    }

    /// Switches to the app registered under `id` (case-insensitive).
    ///
    /// Unknown ids and failed instantiation leave the current app untouched.
    /// Otherwise `ActivationStarting` is emitted before the outgoing app is
    /// torn down, its failures are reported and swallowed, and the incoming
    /// app is activated. If that activation fails no app is left active.
    ///
    /// Once instantiation succeeds the switch runs on its own task and
    /// holds the switch lock until it is done. Dropping the returned future
    /// only stops waiting for the outcome.
    pub async fn activate(&self, id: &str) -> MatrixResult<()> {
        let switch = self.switching.clone().lock_owned().await;

        let (descriptor, factory) = {
            let catalog = self.catalog.read();
            let entry = catalog
                .get(&normalize_id(id))
                .ok_or_else(|| MatrixError::NotFound(id.to_string()))?;
            (entry.descriptor, entry.factory.clone())
        };

        let app = catch_panic(|| factory()).map_err(|source| {
            warn!("failed to instantiate app '{}': {}", descriptor.id, source);
            MatrixError::Instantiation {
                id: descriptor.id.to_string(),
                source,
            }
        })?;

        let id = app.id().to_string();
        let board = self.board.clone();
        let task = tokio::spawn(async move {
            let result = board.switch_to(app).await;
            drop(switch);
            result
        });

        task.await.unwrap_or_else(|err| {
            Err(MatrixError::Lifecycle {
                id,
                stage: LifecycleStage::Activate,
                source: join_failure(err, "switch"),
            })
        })
    }

    /// Deactivates the current app, leaving none active.
    pub async fn shutdown(&self) {
        let switch = self.switching.clone().lock_owned().await;
        let board = self.board.clone();
        let task = tokio::spawn(async move {
            let previous = board.active.write().take();
            if let Some(previous) = previous {
                board.retire(previous).await;
            }
            drop(switch);
        });

        if let Err(err) = task.await {
            let source = join_failure(err, "shutdown");
            warn!("shutdown did not complete: {}", source);
        }
        info!("app registry shut down");
    }

    // The slot may still hold the outgoing app while a switch is tearing it
    // down; a retired instance no longer counts as active.
    fn active_matching(&self, id: &str) -> MatrixResult<Arc<ActiveApp>> {
        self.active()
            .filter(|active| !active.is_retired())
            .filter(|active| active.id().eq_ignore_ascii_case(id.trim()))
            .ok_or_else(|| MatrixError::NotActive(id.to_string()))
    }

    pub async fn active_settings(
        &self,
        id: &str,
    ) -> MatrixResult<Vec<AppSetting>> {
        let active = self.active_matching(id)?;
        let app = active.lock().await;
        Ok(app.settings())
    }

    /// Applies each key to the active app and persists the accepted ones.
    pub async fn update_active_settings(
        &self,
        id: &str,
        updates: &SettingsMap,
    ) -> MatrixResult<SettingsUpdate> {
        let active = self.active_matching(id)?;
        let mut app = active.lock().await;
        let mut outcome = SettingsUpdate::default();

        for (key, value) in updates {
            match catch_panic(|| app.update_setting(key, value)) {
                Ok(()) => {
                    if let Some(storage) = self.board.storage.as_ref() {
                        storage.update_app_setting(
                            active.id(),
                            key,
                            value.clone(),
                        );
                    }
                    outcome.applied.push(key.clone());
                }
                Err(err) => {
                    warn!(
                        "rejected setting '{}' for '{}': {}",
                        key,
                        active.id(),
                        err
                    );
                    outcome.rejected.insert(key.clone(), err.to_string());
                }
            }
        }

        Ok(outcome)
    }

    pub async fn update_active_setting(
        &self,
        id: &str,
        key: &str,
        value: Value,
    ) -> MatrixResult<SettingsUpdate> {
        let mut updates = SettingsMap::new();
        updates.insert(key.to_string(), value);
        self.update_active_settings(id, &updates).await
    }
}

impl Switchboard {
    fn emit(&self, event: RuntimeEvent) {
        debug!("runtime event: {:?}", event);
        for listener in self.listeners.read().iter() {
            listener(&event);
        }
    }

    async fn switch_to(&self, app: Box<dyn MatrixApp>) -> MatrixResult<()> {
        let id = app.id().to_string();
        info!("activating app '{}' ({})", id, app.name());

        self.emit(RuntimeEvent::ActivationStarting {
            id: id.clone(),
            transition: app.wants_transition(),
        });

        let previous = self.active.read().clone();
        if let Some(previous) = previous {
            self.retire(previous).await;
        }

        let mut app = match self.start(app).await {
            Ok(app) => app,
            Err(source) => {
                *self.active.write() = None;
                let err = MatrixError::Lifecycle {
                    id: id.clone(),
                    stage: LifecycleStage::Activate,
                    source,
                };
                report_failure(&err);
                self.emit(RuntimeEvent::ActivationFailed { id });
                return Err(err);
            }
        };

        self.restore_settings(&mut app);

        let active = Arc::new(ActiveApp::new(app));
        let frame_rate = active.frame_rate();
        *self.active.write() = Some(active);

        info!("app '{}' active at {} fps", id, frame_rate);
        self.emit(RuntimeEvent::Activated { id, frame_rate });

        Ok(())
    }

    // Runs `activate` on its own task so a panic is contained. On failure
    // the instance (if it survived) is deactivated to drain anything it
    // spawned.
    async fn start(
        &self,
        mut app: Box<dyn MatrixApp>,
    ) -> Result<Box<dyn MatrixApp>, AppError> {
        let dimensions = self.dimensions;
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            let result = app.activate(dimensions, &config).await;
            (app, result)
        });

        match task.await {
            Ok((app, Ok(()))) => Ok(app),
            Ok((mut app, Err(source))) => {
                let id = app.id().to_string();
                let deadline = CancelScope::new();
                let cancel = deadline.token();
                let cleanup =
                    tokio::spawn(async move { app.deactivate(cancel).await });
                if let Some(err) =
                    self.await_deactivate(cleanup, deadline).await
                {
                    debug!(
                        "cleanup of '{}' after failed activation: {}",
                        id, err
                    );
                }
                Err(source)
            }
            Err(err) => Err(join_failure(err, "activation")),
        }
    }

    async fn retire(&self, previous: Arc<ActiveApp>) {
        previous.retired.store(true, Ordering::Release);
        let id = previous.id().to_string();

        debug!("deactivating app '{}'", id);
        let deadline = CancelScope::new();
        let cancel = deadline.token();
        let task = tokio::spawn(async move {
            let mut app = previous.lock().await;
            app.deactivate(cancel).await
        });

        if let Some(source) = self.await_deactivate(task, deadline).await {
            report_failure(&MatrixError::Lifecycle {
                id: id.clone(),
                stage: LifecycleStage::Deactivate,
                source,
            });
        }

        self.emit(RuntimeEvent::Deactivated { id });
    }

    // Waits at most `deactivate_timeout`; past that the token is cancelled
    // and the task is left to finish on its own.
    async fn await_deactivate(
        &self,
        task: JoinHandle<Result<(), AppError>>,
        deadline: CancelScope,
    ) -> Option<AppError> {
        let outcome =
            tokio::time::timeout(self.deactivate_timeout, task).await;
        deadline.cancel();

        match outcome {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(source))) => Some(source),
            Ok(Err(err)) => Some(join_failure(err, "deactivation")),
            Err(_) => Some(AppError::msg(format!(
                "deactivation did not finish within {:?}",
                self.deactivate_timeout
            ))),
        }
    }

    fn restore_settings(&self, app: &mut Box<dyn MatrixApp>) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };
        let Some(saved) = storage.app_settings(app.id()) else {
            return;
        };

        for (key, value) in &saved {
            if let Err(source) = catch_panic(|| app.update_setting(key, value))
            {
                report_failure(&MatrixError::Persistence(format!(
                    "could not restore setting '{}' of app '{}': {}",
                    key,
                    app.id(),
                    source
                )));
            }
        }

        debug!("restored {} setting(s) for app '{}'", saved.len(), app.id());
    }
}

fn join_failure(err: JoinError, task: &str) -> AppError {
    if err.is_panic() {
        AppError::Panicked(panic_message(err.into_panic().as_ref()))
    } else {
        AppError::msg(format!("{} task was cancelled", task))
    }
}
