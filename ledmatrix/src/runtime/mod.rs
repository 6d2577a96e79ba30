pub mod control;
pub mod events;
pub mod frame_pacer;
pub mod registry;
pub mod scheduler;
pub mod storage;
