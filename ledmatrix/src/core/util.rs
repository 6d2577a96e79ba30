use std::any::Any;
use std::collections::HashMap as StdHashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};

use ahash::RandomState;

use super::error::AppError;

pub type HashMap<K, V> = StdHashMap<K, V, RandomState>;

#[derive(Debug)]
pub struct AtomicF32 {
    inner: AtomicU32,
}

impl AtomicF32 {
    pub const fn new(value: f32) -> Self {
        Self {
            inner: AtomicU32::new(value.to_bits()),
        }
    }

    pub fn load(&self, order: Ordering) -> f32 {
        f32::from_bits(self.inner.load(order))
    }

    pub fn store(&self, value: f32, order: Ordering) {
        self.inner.store(value.to_bits(), order)
    }
}

/// Runs plugin code, converting a panic into [`AppError::Panicked`] so it
/// never unwinds into the caller.
pub fn catch_panic<T>(
    f: impl FnOnce() -> Result<T, AppError>,
) -> Result<T, AppError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            Err(AppError::Panicked(panic_message(payload.as_ref())))
        }
    }
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Catalog keys are case-insensitive.
pub fn normalize_id(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}
