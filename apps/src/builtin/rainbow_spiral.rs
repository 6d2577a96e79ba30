use std::f32::consts::PI;
use std::time::Duration;

use async_trait::async_trait;
use ledmatrix::prelude::*;
use serde_json::Value;

use super::common::{apply_config, draw_line};

pub static DESCRIPTOR: AppDescriptor = AppDescriptor {
    id: "rainbow-spiral",
    name: "Rainbow Spiral",
    frame_rate: 60,
};

const TURNS: f32 = 3.0;

pub struct RainbowSpiral {
    elapsed: f32,
    segments: usize,
    speed: f32,
}

pub fn init() -> Result<Box<dyn MatrixApp>, AppError> {
    Ok(Box::new(RainbowSpiral {
        elapsed: 0.0,
        segments: 60,
        speed: 1.0,
    }))
}

impl RainbowSpiral {
    fn points(&self, width: usize, height: usize) -> Vec<(i32, i32)> {
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let max_radius = (width.min(height) as f32 / 2.0 - 2.0).max(1.0);

        (0..self.segments)
            .map(|i| {
                let t = i as f32 / self.segments as f32;
                let angle = t * PI * 2.0 * TURNS + self.elapsed;
                let radius = t * max_radius;
                (
                    (cx + angle.cos() * radius).round() as i32,
                    (cy + angle.sin() * radius).round() as i32,
                )
            })
            .collect()
    }
}

#[async_trait]
impl MatrixApp for RainbowSpiral {
    fn descriptor(&self) -> &'static AppDescriptor {
        &DESCRIPTOR
    }

    async fn activate(
        &mut self,
        _dimensions: Dimensions,
        config: &AppConfig,
    ) -> Result<(), AppError> {
        apply_config(self, config);
        Ok(())
    }

    fn update(&mut self, delta: Duration) -> Result<(), AppError> {
        self.elapsed += delta.as_secs_f32() * self.speed;
        Ok(())
    }

    fn render(&self, frame: &mut PixelBuffer) -> Result<(), AppError> {
        let points = self.points(frame.width(), frame.height());

        for (i, pair) in points.windows(2).enumerate() {
            let offset = i as f32 / self.segments as f32;
            let hue = (offset + self.elapsed * 0.2).fract();
            let color = Pixel::from_hsv(hue * 360.0, 1.0, 1.0);
            draw_line(frame, pair[0], pair[1], 2, color);
        }

        Ok(())
    }

    fn settings(&self) -> Vec<AppSetting> {
        vec![
            AppSetting::new(
                "segments",
                "Segments",
                SettingKind::Integer,
                60,
                self.segments as i64,
            )
            .describe("Line segments making up the spiral")
            .range(8, 240),
            AppSetting::new(
                "speed",
                "Speed",
                SettingKind::Integer,
                100,
                (self.speed * 100.0).round() as i64,
            )
            .describe("Rotation speed in percent")
            .range(0, 500),
        ]
    }

    fn update_setting(
        &mut self,
        key: &str,
        value: &Value,
    ) -> Result<(), AppError> {
        match key {
            "segments" => {
                self.segments = as_integer(key, value, 8, 240)? as usize;
            }
            "speed" => {
                self.speed = as_integer(key, value, 0, 500)? as f32 / 100.0;
            }
            _ => return Err(AppError::UnknownSetting(key.to_string())),
        }
        Ok(())
    }
}
