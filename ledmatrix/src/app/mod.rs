pub mod application;
pub mod cancel;
pub mod lifecycle;
pub mod setting;
