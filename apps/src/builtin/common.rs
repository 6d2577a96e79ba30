use ledmatrix::prelude::*;
use serde_json::Value;

/// Applies this app's entry of the external config (`apps.<id>`) through
/// `update_setting`. Bad keys are logged and skipped.
pub fn apply_config(app: &mut dyn MatrixApp, config: &AppConfig) {
    let Some(entries) = config.get(app.id()).and_then(Value::as_object) else {
        return;
    };

    for (key, value) in entries {
        if let Err(err) = app.update_setting(key, value) {
            warn!("ignoring config '{}' for '{}': {}", key, app.id(), err);
        }
    }
}

/// Bresenham line, `thickness` pixels wide.
pub fn draw_line(
    frame: &mut PixelBuffer,
    from: (i32, i32),
    to: (i32, i32),
    thickness: i32,
    pixel: Pixel,
) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    let half = thickness.max(1) / 2;

    loop {
        let size = thickness.max(1);
        frame.fill_rect(x - half, y - half, size, size, pixel);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

pub fn fill_circle(
    frame: &mut PixelBuffer,
    cx: f32,
    cy: f32,
    radius: f32,
    pixel: Pixel,
) {
    let r2 = radius * radius;
    let (x0, x1) = ((cx - radius).floor() as i32, (cx + radius).ceil() as i32);
    let (y0, y1) = ((cy - radius).floor() as i32, (cy + radius).ceil() as i32);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let (px, py) = (x as f32 + 0.5 - cx, y as f32 + 0.5 - cy);
            if px * px + py * py <= r2 {
                frame.set_pixel(x, y, pixel);
            }
        }
    }
}

pub const GLYPH_WIDTH: i32 = 3;
pub const GLYPH_HEIGHT: i32 = 5;

// 3x5 bitmaps, one row per entry, most significant of the low 3 bits on the
// left.
fn glyph(c: char) -> Option<[u8; 5]> {
    let rows = match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
        'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        ' ' => [0; 5],
        _ => return None,
    };
    Some(rows)
}

/// Width in pixels of `text` at `scale`, one blank column between glyphs.
pub fn text_width(text: &str, scale: i32) -> i32 {
    let count = text.chars().count() as i32;
    if count == 0 {
        return 0;
    }
    (count * (GLYPH_WIDTH + 1) - 1) * scale
}

/// Largest integer scale at which `text` fits inside `width` x `height`.
pub fn fit_scale(text: &str, width: usize, height: usize) -> i32 {
    let unit_width = text_width(text, 1).max(1);
    let by_width = width as i32 / unit_width;
    let by_height = height as i32 / GLYPH_HEIGHT;
    by_width.min(by_height).max(1)
}

/// Draws `text` with its top-left corner at `(x, y)`. Unknown characters
/// are drawn as blanks.
pub fn draw_text(
    frame: &mut PixelBuffer,
    text: &str,
    x: i32,
    y: i32,
    scale: i32,
    pixel: Pixel,
) {
    let mut cursor = x;
    for c in text.chars() {
        if let Some(rows) = glyph(c.to_ascii_uppercase()) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (0b100 >> col) != 0 {
                        frame.fill_rect(
                            cursor + col * scale,
                            y + row as i32 * scale,
                            scale,
                            scale,
                            pixel,
                        );
                    }
                }
            }
        }
        cursor += (GLYPH_WIDTH + 1) * scale;
    }
}

/// Draws `text` centred in the frame at the largest scale that fits.
pub fn draw_text_centered(frame: &mut PixelBuffer, text: &str, pixel: Pixel) {
    let scale = fit_scale(text, frame.width(), frame.height());
    let x = (frame.width() as i32 - text_width(text, scale)) / 2;
    let y = (frame.height() as i32 - GLYPH_HEIGHT * scale) / 2;
    draw_text(frame, text, x, y, scale, pixel);
}
