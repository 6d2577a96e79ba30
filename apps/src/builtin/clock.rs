use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveTime, Timelike};
use ledmatrix::prelude::*;
use serde_json::Value;

use super::common::{apply_config, draw_text_centered};

pub static DESCRIPTOR: AppDescriptor = AppDescriptor {
    id: "clock",
    name: "Clock",
    frame_rate: 10,
};

const COLORS: [&str; 7] =
    ["White", "Red", "Green", "Blue", "Yellow", "Cyan", "Magenta"];

fn named_color(name: &str) -> Pixel {
    match name {
        "Red" => Pixel::new(255, 0, 0),
        "Green" => Pixel::new(0, 255, 0),
        "Blue" => Pixel::new(0, 0, 255),
        "Yellow" => Pixel::new(255, 255, 0),
        "Cyan" => Pixel::new(0, 255, 255),
        "Magenta" => Pixel::new(255, 0, 255),
        _ => Pixel::WHITE,
    }
}

pub struct Clock {
    show_seconds: bool,
    show_24_hour: bool,
    color_name: String,
    now: NaiveTime,
}

pub fn init() -> Result<Box<dyn MatrixApp>, AppError> {
    Ok(Box::new(Clock {
        show_seconds: true,
        show_24_hour: true,
        color_name: COLORS[0].to_string(),
        now: Local::now().time(),
    }))
}

impl Clock {
    fn text(&self) -> String {
        let (h, m, s) = (self.now.hour(), self.now.minute(), self.now.second());

        if self.show_24_hour {
            return match self.show_seconds {
                true => format!("{:02}:{:02}:{:02}", h, m, s),
                false => format!("{:02}:{:02}", h, m),
            };
        }

        let (pm, h12) = self.now.hour12();
        let suffix = if pm { "PM" } else { "AM" };
        match self.show_seconds {
            true => format!("{:02}:{:02}:{:02} {}", h12, m, s, suffix),
            false => format!("{:02}:{:02} {}", h12, m, suffix),
        }
    }
}

#[async_trait]
impl MatrixApp for Clock {
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

    fn update(&mut self, _delta: Duration) -> Result<(), AppError> {
        self.now = Local::now().time();
        Ok(())
    }

    fn render(&self, frame: &mut PixelBuffer) -> Result<(), AppError> {
        draw_text_centered(frame, &self.text(), named_color(&self.color_name));
        Ok(())
    }

    fn settings(&self) -> Vec<AppSetting> {
        vec![
            AppSetting::new(
                "showSeconds",
                "Show Seconds",
                SettingKind::Boolean,
                true,
                self.show_seconds,
            )
            .describe("Display seconds in the time format"),
            AppSetting::new(
                "show24Hour",
                "24-Hour Format",
                SettingKind::Boolean,
                true,
                self.show_24_hour,
            )
            .describe("Use 24-hour format instead of 12-hour"),
            AppSetting::new(
                "timeColor",
                "Time Color",
                SettingKind::Select,
                COLORS[0],
                self.color_name.clone(),
            )
            .describe("Color of the time display")
            .options(COLORS),
        ]
    }

    fn update_setting(
        &mut self,
        key: &str,
        value: &Value,
    ) -> Result<(), AppError> {
        match key {
            "showSeconds" => self.show_seconds = as_bool(key, value)?,
            "show24Hour" => self.show_24_hour = as_bool(key, value)?,
            "timeColor" => self.color_name = as_option(key, value, &COLORS)?,
            _ => return Err(AppError::UnknownSetting(key.to_string())),
        }
        Ok(())
    }
}
