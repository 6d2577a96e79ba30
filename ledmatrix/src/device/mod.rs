pub mod simulator;

use crate::render::frame_buffer::PixelBuffer;

/// Presentation backend consumed by the scheduler. Implementations use
/// interior mutability: the control surface adjusts brightness and power
/// while the render loop presents.
pub trait MatrixDevice: Send + Sync {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn brightness(&self) -> u8;

    fn set_brightness(&self, brightness: u8);

    fn is_enabled(&self) -> bool;

    fn set_enabled(&self, enabled: bool);

    fn present(&self, frame: &PixelBuffer);
}
