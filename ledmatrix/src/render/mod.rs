pub mod frame_buffer;
pub mod pixel;
pub mod transition;
