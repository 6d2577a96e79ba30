use std::fs;
use std::io::{self, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use parking_lot::Mutex;

use super::MatrixDevice;
use crate::render::frame_buffer::PixelBuffer;

/// In-memory backend that keeps the last presented frame, brightness
/// applied, and can export it as a PNG preview.
#[derive(Debug)]
pub struct SimulatedDevice {
    canvas: Mutex<PixelBuffer>,
    brightness: AtomicU8,
    enabled: AtomicBool,
    presented: AtomicU64,
}

impl SimulatedDevice {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            canvas: Mutex::new(PixelBuffer::new(width, height)),
            brightness: AtomicU8::new(u8::MAX),
            enabled: AtomicBool::new(true),
            presented: AtomicU64::new(0),
        }
    }

    pub fn with_brightness(self, brightness: u8) -> Self {
        self.set_brightness(brightness);
        self
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented.load(Ordering::Relaxed)
    }

    /// Copy of the canvas as last presented.
    pub fn canvas(&self) -> PixelBuffer {
        self.canvas.lock().clone()
    }

    pub fn png_bytes(&self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_png(&mut bytes)?;
        Ok(bytes)
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        if let Some(parent_dir) = path.parent() {
            fs::create_dir_all(parent_dir)?;
        }
        let file = fs::File::create(path)?;
        self.write_png(BufWriter::new(file))
    }

    fn write_png<W: io::Write>(&self, writer: W) -> io::Result<()> {
        let (width, height, data) = {
            let canvas = self.canvas.lock();
            (canvas.width(), canvas.height(), canvas.to_rgb8())
        };

        let mut encoder =
            png::Encoder::new(writer, width as u32, height as u32);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);

        let mut png_writer = encoder.write_header().map_err(io::Error::other)?;
        png_writer.write_image_data(&data).map_err(io::Error::other)?;
        png_writer.finish().map_err(io::Error::other)
    }
}

impl MatrixDevice for SimulatedDevice {
    fn width(&self) -> usize {
        self.canvas.lock().width()
    }

    fn height(&self) -> usize {
        self.canvas.lock().height()
    }

    fn brightness(&self) -> u8 {
        self.brightness.load(Ordering::Relaxed)
    }

    fn set_brightness(&self, brightness: u8) {
        self.brightness.store(brightness, Ordering::Relaxed);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    fn present(&self, frame: &PixelBuffer) {
        let brightness = self.brightness();
        let mut canvas = self.canvas.lock();

        for y in 0..canvas.height().min(frame.height()) {
            for (x, pixel) in frame.row(y).iter().enumerate() {
                canvas.set_pixel(x as i32, y as i32, pixel.scaled(brightness));
            }
        }

        self.presented.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::pixel::Pixel;

    #[test]
    fn present_applies_brightness() {
        let device = SimulatedDevice::new(2, 2).with_brightness(128);
        let mut frame = PixelBuffer::new(2, 2);
        frame.clear(Pixel::new(200, 100, 0));

        device.present(&frame);

        assert_eq!(device.canvas().get_pixel(1, 1), Pixel::new(100, 50, 0));
        assert_eq!(device.frames_presented(), 1);
    }

    #[test]
    fn png_export_has_signature_and_dimensions() {
        let device = SimulatedDevice::new(5, 3);
        let bytes = device.png_bytes().unwrap();

        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let decoder = png::Decoder::new(io::Cursor::new(bytes));
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().width, 5);
        assert_eq!(reader.info().height, 3);
    }

    #[test]
    fn save_png_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview").join("frame.png");
        SimulatedDevice::new(4, 4).save_png(&path).unwrap();
        assert!(path.exists());
    }
}
