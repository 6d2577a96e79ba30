use std::sync::mpsc;
use std::sync::mpsc::{Receiver, Sender};

use parking_lot::Mutex;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RuntimeEvent {
    /// Fired before the outgoing app is torn down.
    ActivationStarting { id: String, transition: bool },
    Activated { id: String, frame_rate: u32 },
    ActivationFailed { id: String },
    Deactivated { id: String },
}

impl RuntimeEvent {
    pub fn id(&self) -> &str {
        match self {
            Self::ActivationStarting { id, .. }
            | Self::Activated { id, .. }
            | Self::ActivationFailed { id }
            | Self::Deactivated { id } => id,
        }
    }
}

/// Synchronous observer, invoked on the thread that drives the activation.
pub type EventListener = Box<dyn Fn(&RuntimeEvent) + Send + Sync + 'static>;

pub type RuntimeEventSender = Sender<RuntimeEvent>;
pub type RuntimeEventReceiver = Receiver<RuntimeEvent>;

pub fn event_channel() -> (RuntimeEventSender, RuntimeEventReceiver) {
    mpsc::channel()
}

/// Listener that forwards every event into a channel, for consumers that
/// prefer to drain events on their own schedule.
pub fn forward_to(tx: RuntimeEventSender) -> EventListener {
    let tx = Mutex::new(tx);
    Box::new(move |event| {
        let _ = tx.lock().send(event.clone());
    })
}
