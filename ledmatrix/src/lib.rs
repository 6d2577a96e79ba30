pub mod app;
pub mod core;
pub mod device;
pub mod prelude;
pub mod render;
pub mod runtime;

pub use runtime::control::{ControlCommand, Controller};
pub use runtime::registry::AppRegistry;
pub use runtime::scheduler::FrameScheduler;
