use anyhow::{bail, Context};
use grist_runtime::ParserOptions;
use serde::Deserialize;
use serde_json::Value;

/// Options of [`crate::process_with`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Config {
    pub recursion_limit: u32,
    pub keep_skipped: bool,
}

impl Default for Config {
    fn default() -> Self {
        let ParserOptions {
            recursion_limit,
            keep_skipped,
        } = ParserOptions::default();

        Self {
            recursion_limit,
            keep_skipped,
        }
    }
}

impl Config {
    /// Read a config from a json object, absent fields keep their default.
    pub fn from_json(mut value: Value) -> anyhow::Result<Self> {
        let Value::Object(fields) = &mut value else {
            bail!("Expected config to be an object");
        };

        let default = Config::default();
        let config = Config {
            recursion_limit: read_field(fields, "recursionLimit")?
                .unwrap_or(default.recursion_limit),
            keep_skipped: read_field(fields, "keepSkipped")?.unwrap_or(default.keep_skipped),
        };

        if let Some(name) = fields.keys().next() {
            bail!("Unknown field config.{name}");
        }

        Ok(config)
    }

    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            recursion_limit: self.recursion_limit,
            keep_skipped: self.keep_skipped,
        }
    }
}

fn read_field<T: for<'de> Deserialize<'de>>(
    fields: &mut serde_json::Map<String, Value>,
    name: &str,
) -> anyhow::Result<Option<T>> {
    let Some(field) = fields.remove(name) else {
        return Ok(None);
    };

    let typename = std::any::type_name::<T>();
    serde_json::from_value::<T>(field.clone())
        .map(Some)
        .with_context(|| format!("Expected config.{name} of type {typename}, got {field}"))
}
