pub use crate::app::application::{
    AppConfig, AppDescriptor, AppFactory, Dimensions, MatrixApp,
};
pub use crate::app::cancel::{CancelScope, CancelToken};
pub use crate::app::lifecycle::AppLifecycle;
pub use crate::app::setting::{
    AppSetting, SettingKind, as_bool, as_color, as_integer, as_option,
    as_string,
};
pub use crate::core::config::MatrixConfig;
pub use crate::core::error::{AppError, MatrixError, MatrixResult};
pub use crate::core::logging::init_logger;
pub use crate::core::logging::{debug, error, info, trace, warn};
pub use crate::core::util::HashMap;
pub use crate::device::MatrixDevice;
pub use crate::device::simulator::SimulatedDevice;
pub use crate::render::frame_buffer::PixelBuffer;
pub use crate::render::pixel::Pixel;
pub use crate::runtime::control::{ControlCommand, Controller};
pub use crate::runtime::events::{RuntimeEvent, event_channel, forward_to};
pub use crate::runtime::registry::{AppRegistry, AppSummary, SettingsUpdate};
pub use crate::runtime::scheduler::{
    EngineStatus, FrameScheduler, SchedulerOptions, TickOutcome,
};
pub use crate::runtime::storage::AppSettingsStorage;
