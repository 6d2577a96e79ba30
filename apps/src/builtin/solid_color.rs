use std::time::Duration;

use async_trait::async_trait;
use ledmatrix::prelude::*;
use serde_json::Value;

use super::common::apply_config;

pub static DESCRIPTOR: AppDescriptor = AppDescriptor {
    id: "solid-color",
    name: "Solid Color",
    frame_rate: 10,
};

const DEFAULT_COLOR: Pixel = Pixel::new(20, 255, 0);

pub struct SolidColor {
    color: Pixel,
}

pub fn init() -> Result<Box<dyn MatrixApp>, AppError> {
    Ok(Box::new(SolidColor {
        color: DEFAULT_COLOR,
    }))
}

#[async_trait]
impl MatrixApp for SolidColor {
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
        Ok(())
    }

    fn render(&self, frame: &mut PixelBuffer) -> Result<(), AppError> {
        frame.clear(self.color);
        Ok(())
    }

    fn settings(&self) -> Vec<AppSetting> {
        vec![
            AppSetting::new(
                "color",
                "Color",
                SettingKind::Color,
                DEFAULT_COLOR.to_hex(),
                self.color.to_hex(),
            )
            .describe("Fill color as #rrggbb"),
        ]
    }

    fn update_setting(
        &mut self,
        key: &str,
        value: &Value,
    ) -> Result<(), AppError> {
        match key {
            "color" => {
                self.color = as_color(key, value)?;
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

    #[tokio::test]
    async fn fills_with_configured_color() {
        let mut app = init().expect("init");
        let mut config = AppConfig::new();
        config.insert("solid-color".to_string(), json!({ "color": "#0000ff" }));

        app.activate(Dimensions::new(4, 2), &config)
            .await
            .expect("activate");

        let mut frame = PixelBuffer::new(4, 2);
        app.render(&mut frame).expect("render");
        assert!(frame.pixels().iter().all(|p| *p == Pixel::new(0, 0, 255)));
    }

    #[test]
    fn rejects_malformed_color() {
        let mut app = init().expect("init");
        assert!(app.update_setting("color", &json!("green")).is_err());
        assert_eq!(app.settings()[0].current_value, json!("#14ff00"));
    }
}
