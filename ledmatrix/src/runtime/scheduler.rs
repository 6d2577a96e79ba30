use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::events::RuntimeEvent;
use super::frame_pacer::FramePacer;
use super::registry::AppRegistry;
use crate::app::cancel::{CancelScope, CancelToken};
use crate::core::config::MatrixConfig;
use crate::core::error::{MatrixError, TickPhase};
use crate::core::logging::report_failure;
use crate::core::util::{AtomicF32, catch_panic};
use crate::device::MatrixDevice;
use crate::render::frame_buffer::PixelBuffer;
use crate::render::pixel::Pixel;
use crate::render::transition::{
    SlideTransition, TransitionPhase, TransitionStep,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub default_fps: u32,
    pub transition_speed: usize,
    pub transitions_enabled: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from(&MatrixConfig::default())
    }
}

impl From<&MatrixConfig> for SchedulerOptions {
    fn from(config: &MatrixConfig) -> Self {
        Self {
            default_fps: config.default_fps.max(1),
            transition_speed: config.transition_speed.max(1),
            transitions_enabled: config.transitions_enabled,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Device powered off; nothing ran.
    Disabled,
    /// Nothing presented this tick: the active app was busy, retiring, or
    /// its render failed.
    Skipped,
    Presented { transitioning: bool },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub target_fps: u32,
    pub average_fps: f32,
    pub running: bool,
    pub enabled: bool,
    pub frames_presented: u64,
    pub transitioning: bool,
}

struct FrameState {
    // Working buffer: cleared and rendered into every tick.
    back: PixelBuffer,
    // Last presented frame; source of transition snapshots.
    front: PixelBuffer,
    transition: Option<SlideTransition>,
}

struct Shared {
    device: Arc<dyn MatrixDevice>,
    registry: Arc<AppRegistry>,
    options: SchedulerOptions,
    frame: Mutex<FrameState>,
    average_fps: AtomicF32,
    frames_presented: AtomicU64,
}

struct LoopHandle {
    scope: CancelScope,
    task: JoinHandle<()>,
}

/// Drives the active app at its requested rate and presents every frame.
///
/// The scheduler never chooses *which* app runs; it reads the registry's
/// active slot each tick and reacts to its switch events to run the slide
/// transition.
pub struct FrameScheduler {
    shared: Arc<Shared>,
    running: Mutex<Option<LoopHandle>>,
}

impl FrameScheduler {
    pub fn new(
        device: Arc<dyn MatrixDevice>,
        registry: Arc<AppRegistry>,
        options: SchedulerOptions,
    ) -> Self {
        let (width, height) = (device.width(), device.height());
        let shared = Arc::new(Shared {
            device,
            registry: registry.clone(),
            options,
            frame: Mutex::new(FrameState {
                back: PixelBuffer::new(width, height),
                front: PixelBuffer::new(width, height),
                transition: None,
            }),
            average_fps: AtomicF32::new(0.0),
            frames_presented: AtomicU64::new(0),
        });

        let weak = Arc::downgrade(&shared);
        registry.subscribe(Box::new(move |event| {
            if let Some(shared) = Weak::upgrade(&weak) {
                shared.on_event(event);
            }
        }));

        Self {
            shared,
            running: Mutex::new(None),
        }
    }

    pub fn options(&self) -> SchedulerOptions {
        self.shared.options
    }

    /// Spawns the render loop on the current tokio runtime. Returns `false`
    /// when a loop is already running or no runtime is available.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(LoopHandle::is_alive) {
            debug!("scheduler already running");
            return false;
        }

        let Ok(handle) = Handle::try_current() else {
            warn!("cannot start scheduler outside a tokio runtime");
            return false;
        };

        let scope = CancelScope::new();
        let task = handle.spawn(run_loop(self.shared.clone(), scope.token()));
        *running = Some(LoopHandle { scope, task });

        info!(
            "scheduler started (default {} fps)",
            self.shared.options.default_fps
        );
        true
    }

    /// Signals the loop to stop and returns without waiting for it.
    pub fn stop(&self) {
        if let Some(handle) = self.running.lock().take() {
            handle.scope.cancel();
            info!("scheduler stopping");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().as_ref().is_some_and(LoopHandle::is_alive)
    }

    /// One loop iteration minus the pacing. Public so tests can step the
    /// scheduler deterministically.
    pub fn tick(&self, delta: Duration) -> TickOutcome {
        self.shared.tick(delta)
    }

    /// Rate the next sleep is computed from.
    pub fn target_fps(&self) -> u32 {
        self.shared.target_fps()
    }

    pub fn is_transitioning(&self) -> bool {
        self.shared.frame.lock().transition.is_some()
    }

    /// Copy of the last presented frame, before brightness scaling.
    pub fn last_frame(&self) -> PixelBuffer {
        self.shared.frame.lock().front.clone()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            target_fps: self.target_fps(),
            average_fps: self.shared.average_fps.load(Ordering::Relaxed),
            running: self.is_running(),
            enabled: self.shared.device.is_enabled(),
            frames_presented: self
                .shared
                .frames_presented
                .load(Ordering::Relaxed),
            transitioning: self.is_transitioning(),
        }
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl LoopHandle {
    fn is_alive(&self) -> bool {
        !self.scope.is_cancelled() && !self.task.is_finished()
    }
}

impl Shared {
    fn target_fps(&self) -> u32 {
        self.registry
            .active()
            .map(|active| active.frame_rate())
            .unwrap_or(self.options.default_fps)
    }

    fn on_event(&self, event: &RuntimeEvent) {
        match event {
            RuntimeEvent::ActivationStarting { id, transition } => {
                let mut frame = self.frame.lock();
                let slide = *transition
                    && self.options.transitions_enabled
                    && self.registry.active().is_some();

                frame.transition = slide.then(|| {
                    trace!("snapshotting frame for transition to '{}'", id);
                    SlideTransition::new(
                        id.clone(),
                        frame.front.clone(),
                        self.options.transition_speed,
                    )
                });
            }
            RuntimeEvent::Activated { id, .. } => {
                let mut frame = self.frame.lock();
                if let Some(transition) = frame.transition.as_mut() {
                    if transition.incoming_id() == id {
                        transition.start_sliding();
                    }
                }
            }
            RuntimeEvent::ActivationFailed { .. } => {
                self.frame.lock().transition = None;
            }
            RuntimeEvent::Deactivated { .. } => {}
        }
    }

    fn tick(&self, delta: Duration) -> TickOutcome {
        if !self.device.is_enabled() {
            return TickOutcome::Disabled;
        }

        let mut frame = self.frame.lock();
        let FrameState {
            back,
            front,
            transition,
        } = &mut *frame;

        if let Some(pending) = transition
            .as_ref()
            .filter(|t| t.phase() == TransitionPhase::Pending)
        {
            pending.show_snapshot(back);
            return self.present(back, front, true);
        }

        match self.registry.active() {
            Some(active) => {
                if active.is_retired() {
                    return TickOutcome::Skipped;
                }
                // Activation or a settings call holds the instance; try again
                // next tick instead of waiting.
                let Some(mut app) = active.try_lock() else {
                    return TickOutcome::Skipped;
                };

                if let Err(source) = catch_panic(|| app.update(delta)) {
                    report_failure(&MatrixError::Tick {
                        id: active.id().to_string(),
                        phase: TickPhase::Update,
                        source,
                    });
                }
                active.set_frame_rate(app.frame_rate());

                back.clear(Pixel::BLACK);
                if let Err(source) = catch_panic(|| app.render(back)) {
                    report_failure(&MatrixError::Tick {
                        id: active.id().to_string(),
                        phase: TickPhase::Render,
                        source,
                    });
                    return TickOutcome::Skipped;
                }
            }
            None => back.clear(Pixel::BLACK),
        }

        let transitioning = match transition.as_mut() {
            Some(slide) => {
                if slide.composite(back) == TransitionStep::Finished {
                    debug!("transition to '{}' finished", slide.incoming_id());
                    *transition = None;
                }
                true
            }
            None => false,
        };

        self.present(back, front, transitioning)
    }

    fn present(
        &self,
        back: &mut PixelBuffer,
        front: &mut PixelBuffer,
        transitioning: bool,
    ) -> TickOutcome {
        std::mem::swap(back, front);
        self.device.present(front);
        self.frames_presented.fetch_add(1, Ordering::Relaxed);
        TickOutcome::Presented { transitioning }
    }
}

async fn run_loop(shared: Arc<Shared>, cancel: CancelToken) {
    let mut pacer = FramePacer::new();

    while !cancel.is_cancelled() {
        let started = Instant::now();
        let delta = pacer.begin_tick(started);

        if let TickOutcome::Presented { .. } = shared.tick(delta) {
            pacer.record_present(Instant::now());
            shared
                .average_fps
                .store(pacer.average_fps(), Ordering::Relaxed);
        }

        let sleep = FramePacer::sleep_duration(
            shared.target_fps(),
            started.elapsed(),
        );
        if sleep.is_zero() {
            tokio::task::yield_now().await;
            continue;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(sleep) => {}
        }
    }

    debug!("scheduler loop exited after {} frames", pacer.frame_count());
}
