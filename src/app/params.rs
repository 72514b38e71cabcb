// src/app/params.rs

//! Typed command-line parameter declarations and their rendering rules.
//!
//! A [`ParameterSpec`] describes one parameter of an app's command line:
//! its type, the option prefix, the prefix/value separator, quoting, and an
//! optional default. [`ParameterSpec::format`] turns a runtime value into
//! the exact token string that appears in a rendered script.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::ConfigError;

/// The closed set of parameter types. Anything else fails at document
/// load time, not at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Integer,
    Number,
    Float,
    String,
    Flag,
    Boolean,
    Array,
}

impl ParamType {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "integer" => Ok(Self::Integer),
            "number" => Ok(Self::Number),
            "float" => Ok(Self::Float),
            "string" => Ok(Self::String),
            "flag" => Ok(Self::Flag),
            "boolean" => Ok(Self::Boolean),
            "array" => Ok(Self::Array),
            other => Err(ConfigError::UnknownParamType { ty: other.to_string() }),
        }
    }
}

impl<'de> Deserialize<'de> for ParamType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ParamType::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Rendering rules for the items of an `array` parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemSpec {
    /// Separator between rendered items.
    #[serde(default = "default_separator")]
    pub separator: String,

    /// If true, each item gets its own `prefix SEP item` occurrence;
    /// if false, items are joined first and formatted once.
    #[serde(default)]
    pub is_split: bool,

    /// Single-quote each item individually.
    #[serde(default)]
    pub item_quotes: bool,
}

impl Default for ItemSpec {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            is_split: false,
            item_quotes: false,
        }
    }
}

/// One typed parameter declaration from an app definition document.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub ty: ParamType,

    #[serde(default)]
    pub prefix: String,

    #[serde(default = "default_separator")]
    pub separator: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub default: Option<Value>,

    /// Single-quote string values.
    #[serde(default)]
    pub quotes: bool,

    #[serde(default)]
    pub hint: Option<String>,

    /// Item rules for `array` parameters.
    #[serde(default)]
    pub item: Option<ItemSpec>,
}

fn default_separator() -> String {
    " ".to_string()
}

impl ParameterSpec {
    /// Render `value` (falling back to the declared default) into the
    /// command-line token string for this parameter.
    pub fn format(&self, value: Option<&Value>) -> String {
        let value = match value.or(self.default.as_ref()) {
            Some(v) => v,
            None => return String::new(),
        };

        match self.ty {
            ParamType::Flag => {
                if truthy(value) {
                    self.prefix.clone()
                } else {
                    String::new()
                }
            }
            ParamType::Boolean => self.join(&bool_text(truthy(value))),
            ParamType::String => {
                let text = scalar_text(value);
                if self.quotes {
                    self.join(&format!("'{text}'"))
                } else {
                    self.join(&text)
                }
            }
            ParamType::Integer | ParamType::Number | ParamType::Float => {
                self.join(&scalar_text(value))
            }
            ParamType::Array => self.format_array(value),
        }
    }

    fn format_array(&self, value: &Value) -> String {
        let item = self.item.clone().unwrap_or_default();

        let single;
        let items: &[Value] = match value {
            Value::Array(items) => items,
            other => {
                single = [other.clone()];
                &single
            }
        };

        let rendered: Vec<String> = items
            .iter()
            .map(|v| {
                let text = scalar_text(v);
                if item.item_quotes { format!("'{text}'") } else { text }
            })
            .collect();

        if item.is_split {
            rendered
                .iter()
                .map(|t| self.join(t))
                .collect::<Vec<_>>()
                .join(&item.separator)
        } else {
            self.join(&rendered.join(&item.separator))
        }
    }

    fn join(&self, text: &str) -> String {
        format!("{}{}{}", self.prefix, self.separator, text)
    }
}

/// Literal scalar text of a JSON value, without JSON quoting. Booleans
/// render in the capitalised form downstream scripts expect.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => bool_text(*b),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn bool_text(b: bool) -> String {
    if b { "True".to_string() } else { "False".to_string() }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.as_str(), "true" | "True" | "yes" | "1"),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::Null => false,
        _ => true,
    }
}
