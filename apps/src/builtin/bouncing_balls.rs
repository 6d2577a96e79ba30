use std::time::Duration;

use async_trait::async_trait;
use ledmatrix::prelude::*;
use rand::Rng;
use serde_json::Value;

use super::common::{apply_config, fill_circle};

pub static DESCRIPTOR: AppDescriptor = AppDescriptor {
    id: "bouncing-balls",
    name: "Bouncing Balls",
    frame_rate: 60,
};

const DEFAULT_COUNT: usize = 10;

#[derive(Clone, Debug)]
struct Ball {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    radius: f32,
    color: Pixel,
}

pub struct BouncingBalls {
    dimensions: Option<Dimensions>,
    count: usize,
    balls: Vec<Ball>,
}

pub fn init() -> Result<Box<dyn MatrixApp>, AppError> {
    Ok(Box::new(BouncingBalls {
        dimensions: None,
        count: DEFAULT_COUNT,
        balls: Vec::new(),
    }))
}

fn spawn_balls(count: usize, dimensions: Dimensions) -> Vec<Ball> {
    let mut rng = rand::rng();
    let (w, h) = (dimensions.width as f32, dimensions.height as f32);

    (0..count)
        .map(|_| {
            let radius =
                rng.random_range(2.0..5.0_f32).min(w / 2.0).min(h / 2.0);
            Ball {
                x: rng.random_range(radius..=(w - radius).max(radius)),
                y: rng.random_range(radius..=(h - radius).max(radius)),
                vx: rng.random_range(-30.0..30.0),
                vy: rng.random_range(-30.0..30.0),
                radius,
                color: Pixel::from_hsv(rng.random_range(0.0..360.0), 1.0, 1.0),
            }
        })
        .collect()
}

impl Ball {
    fn advance(&mut self, dt: f32, width: f32, height: f32) {
        self.x += self.vx * dt;
        self.y += self.vy * dt;

        if self.x - self.radius <= 0.0 || self.x + self.radius >= width {
            self.vx = -self.vx;
            let max_x = (width - self.radius).max(self.radius);
            self.x = self.x.clamp(self.radius, max_x);
        }
        if self.y - self.radius <= 0.0 || self.y + self.radius >= height {
            self.vy = -self.vy;
            let max_y = (height - self.radius).max(self.radius);
            self.y = self.y.clamp(self.radius, max_y);
        }
    }
}

#[async_trait]
impl MatrixApp for BouncingBalls {
    fn descriptor(&self) -> &'static AppDescriptor {
        &DESCRIPTOR
    }

    async fn activate(
        &mut self,
        dimensions: Dimensions,
        config: &AppConfig,
    ) -> Result<(), AppError> {
        self.dimensions = Some(dimensions);
        apply_config(self, config);
        if self.balls.is_empty() {
            self.balls = spawn_balls(self.count, dimensions);
        }
        Ok(())
    }

    fn update(&mut self, delta: Duration) -> Result<(), AppError> {
        let Some(dimensions) = self.dimensions else {
            return Ok(());
        };
        let dt = delta.as_secs_f32();
        for ball in &mut self.balls {
            ball.advance(dt, dimensions.width as f32, dimensions.height as f32);
        }
        Ok(())
    }

    fn render(&self, frame: &mut PixelBuffer) -> Result<(), AppError> {
        for ball in &self.balls {
            fill_circle(frame, ball.x, ball.y, ball.radius, ball.color);
            // Bright core.
            fill_circle(frame, ball.x, ball.y, ball.radius * 0.5, Pixel::WHITE);
        }
        Ok(())
    }

    fn settings(&self) -> Vec<AppSetting> {
        vec![
            AppSetting::new(
                "count",
                "Ball Count",
                SettingKind::Integer,
                DEFAULT_COUNT as i64,
                self.count as i64,
            )
            .range(1, 40),
        ]
    }

    fn update_setting(
        &mut self,
        key: &str,
        value: &Value,
    ) -> Result<(), AppError> {
        match key {
            "count" => {
                self.count = as_integer(key, value, 1, 40)? as usize;
                if let Some(dimensions) = self.dimensions {
                    self.balls = spawn_balls(self.count, dimensions);
                }
                Ok(())
            }
            _ => Err(AppError::UnknownSetting(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn balls_stay_inside_the_frame() {
        let dimensions = Dimensions::new(32, 16);
        let mut balls = spawn_balls(20, dimensions);

        for _ in 0..500 {
            for ball in &mut balls {
                ball.advance(0.05, 32.0, 16.0);
                assert!(ball.x >= ball.radius && ball.x <= 32.0 - ball.radius);
                assert!(ball.y >= ball.radius && ball.y <= 16.0 - ball.radius);
            }
        }
    }

    #[tokio::test]
    async fn count_setting_respawns() {
        let mut app = init().expect("init");
        app.activate(Dimensions::new(32, 16), &AppConfig::new())
            .await
            .expect("activate");
        app.update_setting("count", &json!(3)).expect("count");

        let mut frame = PixelBuffer::new(32, 16);
        app.render(&mut frame).expect("render");
        assert!(frame.pixels().iter().any(|p| *p == Pixel::WHITE));
        assert_eq!(app.settings()[0].current_value, json!(3));
    }
}
