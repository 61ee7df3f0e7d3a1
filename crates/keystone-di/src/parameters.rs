//! Flat key/value parameters passed at the parameterize stage

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::configuration::{Configuration, ConfigurationError};

/// Errors raised by [`Parameters`] accessors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("Parameter '{name}' is not set")]
    Missing { name: String },

    #[error("Parameter '{name}' has value '{value}' which is not a valid {expected}")]
    Invalid {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("Parameters are read-only")]
    ReadOnly,
}

/// String parameters with typed accessors.
///
/// Parameters handed to a component are frozen: every mutator returns
/// [`ParameterError::ReadOnly`] afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    values: BTreeMap<String, String>,
    #[serde(skip)]
    read_only: bool,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert for assembling parameters before registration
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Set a parameter, returning the previous value
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, ParameterError> {
        self.check_writeable()?;
        Ok(self.values.insert(name.into(), value.into()))
    }

    /// Remove a parameter, returning its value
    pub fn remove(&mut self, name: &str) -> Result<Option<String>, ParameterError> {
        self.check_writeable()?;
        Ok(self.values.remove(name))
    }

    /// Freeze these parameters
    pub fn make_read_only(&mut self) {
        self.read_only = true;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_parameter(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<&str, ParameterError> {
        self.values
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ParameterError::Missing {
                name: name.to_string(),
            })
    }

    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.values.get(name).map(String::as_str).unwrap_or(default)
    }

    /// Integer value; accepts `0x`, `0o` and `0b` prefixes
    pub fn get_as_integer(&self, name: &str) -> Result<i64, ParameterError> {
        let value = self.get(name)?;
        parse_integer(value).ok_or_else(|| ParameterError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            expected: "integer",
        })
    }

    pub fn get_as_integer_or(&self, name: &str, default: i64) -> i64 {
        self.get_as_integer(name).unwrap_or(default)
    }

    pub fn get_as_float(&self, name: &str) -> Result<f64, ParameterError> {
        let value = self.get(name)?;
        value.trim().parse().map_err(|_| ParameterError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            expected: "float",
        })
    }

    pub fn get_as_float_or(&self, name: &str, default: f64) -> f64 {
        self.get_as_float(name).unwrap_or(default)
    }

    /// `true`/`false`, case-insensitive
    pub fn get_as_bool(&self, name: &str) -> Result<bool, ParameterError> {
        let value = self.get(name)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ParameterError::Invalid {
                name: name.to_string(),
                value: value.to_string(),
                expected: "boolean",
            }),
        }
    }

    pub fn get_as_bool_or(&self, name: &str, default: bool) -> bool {
        self.get_as_bool(name).unwrap_or(default)
    }

    /// New writeable parameters holding these values overlaid with `other`'s
    pub fn merge(&self, other: &Parameters) -> Parameters {
        let mut values = self.values.clone();
        values.extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Parameters {
            values,
            read_only: false,
        }
    }

    /// Build parameters from `<parameter name=".." value=".."/>` children
    pub fn from_configuration(configuration: &Configuration) -> Result<Self, ConfigurationError> {
        let mut parameters = Parameters::new();
        for child in configuration.children_named("parameter") {
            let name = child.attribute("name")?;
            let value = child.attribute("value")?;
            parameters.values.insert(name.to_string(), value.to_string());
        }
        Ok(parameters)
    }

    fn check_writeable(&self) -> Result<(), ParameterError> {
        if self.read_only {
            Err(ParameterError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Parameters {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            read_only: false,
        }
    }
}

pub(crate) fn parse_integer(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = digits.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = digits.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else {
        digits.parse::<i64>().ok()
    }?;

    Some(if negative { -parsed } else { parsed })
}
