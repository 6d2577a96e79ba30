use super::pixel::Pixel;

/// Fixed-size, row-major grid of RGB pixels.
///
/// All coordinate access is bounds checked: writes outside the grid are
/// dropped and reads outside the grid return [`Pixel::BLACK`], so callers
/// can draw without clipping logic of their own.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    pixels: Vec<Pixel>,
}

impl PixelBuffer {
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    pub fn new(width: usize, height: usize) -> Self {
        assert!(
            width > 0 && height > 0,
            "pixel buffer dimensions must be positive, got {}x{}",
            width,
            height
        );

        Self {
            width,
            height,
            pixels: vec![Pixel::BLACK; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, pixel: Pixel) {
        if let Some(index) = self.index(x, y) {
            self.pixels[index] = pixel;
        }
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Pixel {
        self.index(x, y)
            .map(|index| self.pixels[index])
            .unwrap_or(Pixel::BLACK)
    }

    pub fn clear(&mut self, pixel: Pixel) {
        self.pixels.fill(pixel);
    }

    /// Read-only view of row `y`; empty when `y` is out of range.
    pub fn row(&self, y: usize) -> &[Pixel] {
        if y >= self.height {
            return &[];
        }
        let start = y * self.width;
        &self.pixels[start..start + self.width]
    }

    pub(crate) fn row_mut(&mut self, y: usize) -> &mut [Pixel] {
        if y >= self.height {
            return &mut [];
        }
        let start = y * self.width;
        &mut self.pixels[start..start + self.width]
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Fills the clipped intersection of the rectangle and the grid.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, pixel: Pixel) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = x.saturating_add(w).min(self.width as i32);
        let y1 = y.saturating_add(h).min(self.height as i32);

        for yy in y0..y1 {
            for xx in x0..x1 {
                self.set_pixel(xx, yy, pixel);
            }
        }
    }

    /// Copies the overlapping region of `other`, clipping on size mismatch.
    pub fn copy_from(&mut self, other: &PixelBuffer) {
        let w = self.width.min(other.width);
        let h = self.height.min(other.height);

        for y in 0..h {
            let dst = y * self.width;
            self.pixels[dst..dst + w].copy_from_slice(&other.row(y)[..w]);
        }
    }

    /// Absorbs an externally rendered, tightly packed RGB8 image. Copies as
    /// many rows and columns as both sizes allow. A `data` slice shorter than
    /// `src_width * src_height * 3` is treated as having fewer rows.
    pub fn absorb_rgb8(
        &mut self,
        data: &[u8],
        src_width: usize,
        src_height: usize,
    ) {
        if src_width == 0 {
            return;
        }

        let stride = src_width * 3;
        let rows = src_height.min(data.len() / stride).min(self.height);
        let cols = src_width.min(self.width);

        for (y, src_row) in data.chunks_exact(stride).take(rows).enumerate() {
            let dst = y * self.width;
            for (x, rgb) in src_row.chunks_exact(3).take(cols).enumerate() {
                self.pixels[dst + x] = Pixel::new(rgb[0], rgb[1], rgb[2]);
            }
        }
    }

    /// Packed RGB8 bytes, row-major.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 3);
        for pixel in &self.pixels {
            bytes.extend_from_slice(&[pixel.r, pixel.g, pixel.b]);
        }
        bytes
    }
}
