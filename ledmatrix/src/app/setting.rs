use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::AppError;
use crate::render::pixel::Pixel;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    Boolean,
    Integer,
    String,
    Color,
    Select,
}

/// Describes one user-adjustable setting of a configurable app.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSetting {
    pub key: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: SettingKind,
    pub default_value: Value,
    pub current_value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl AppSetting {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        kind: SettingKind,
        default_value: impl Into<Value>,
        current_value: impl Into<Value>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: String::new(),
            kind,
            default_value: default_value.into(),
            current_value: current_value.into(),
            min_value: None,
            max_value: None,
            options: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.min_value = Some(min.into());
        self.max_value = Some(max.into());
        self
    }

    pub fn options<S: Into<String>>(
        mut self,
        options: impl IntoIterator<Item = S>,
    ) -> Self {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }
}

// Value coercion helpers for `MatrixApp::update_setting` implementations.
// Values arrive as JSON, from the control surface or from the settings file.

pub fn as_bool(key: &str, value: &Value) -> Result<bool, AppError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => s
            .parse::<bool>()
            .map_err(|_| AppError::invalid_setting(key, "expected a boolean")),
        _ => Err(AppError::invalid_setting(key, "expected a boolean")),
    }
}

pub fn as_integer(
    key: &str,
    value: &Value,
    min: i64,
    max: i64,
) -> Result<i64, AppError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    let n = parsed
        .ok_or_else(|| AppError::invalid_setting(key, "expected an integer"))?;

    if !(min..=max).contains(&n) {
        return Err(AppError::invalid_setting(
            key,
            format!("{} is outside {}..={}", n, min, max),
        ));
    }

    Ok(n)
}

pub fn as_string(key: &str, value: &Value) -> Result<String, AppError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(AppError::invalid_setting(key, "expected a string")),
    }
}

/// Accepts `#rrggbb` strings.
pub fn as_color(key: &str, value: &Value) -> Result<Pixel, AppError> {
    value
        .as_str()
        .and_then(Pixel::from_hex)
        .ok_or_else(|| AppError::invalid_setting(key, "expected #rrggbb"))
}

pub fn as_option(
    key: &str,
    value: &Value,
    options: &[&str],
) -> Result<String, AppError> {
    let choice = as_string(key, value)?;
    options
        .iter()
        .find(|option| option.eq_ignore_ascii_case(&choice))
        .map(|option| option.to_string())
        .ok_or_else(|| {
            AppError::invalid_setting(
                key,
                format!("expected one of {}", options.join(", ")),
            )
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn setting_serializes_for_the_control_surface() {
        let setting =
            AppSetting::new("speed", "Speed", SettingKind::Integer, 30, 45)
                .describe("Pixels per second")
                .range(1, 120);

        let json = serde_json::to_value(&setting).unwrap();

        assert_eq!(json["type"], "integer");
        assert_eq!(json["defaultValue"], 30);
        assert_eq!(json["currentValue"], 45);
        assert_eq!(json["maxValue"], 120);
        assert!(json.get("options").is_none());
    }

    #[test]
    fn coercion_helpers() {
        assert!(as_bool("k", &json!(true)).unwrap());
        assert!(!as_bool("k", &json!("false")).unwrap());
        assert!(as_bool("k", &json!(1)).is_err());

        assert_eq!(as_integer("k", &json!(5), 0, 10).unwrap(), 5);
        assert_eq!(as_integer("k", &json!("7"), 0, 10).unwrap(), 7);
        assert!(matches!(
            as_integer("k", &json!(11), 0, 10),
            Err(AppError::InvalidSetting { .. })
        ));

        assert_eq!(
            as_color("k", &json!("#00ff00")).unwrap(),
            Pixel::new(0, 255, 0)
        );
        assert!(as_color("k", &json!("green")).is_err());

        let fonts = ["Regular", "Bold"];
        assert_eq!(as_option("k", &json!("bold"), &fonts).unwrap(), "Bold");
        assert!(as_option("k", &json!("italic"), &fonts).is_err());
    }
}
