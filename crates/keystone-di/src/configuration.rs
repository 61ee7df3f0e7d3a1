//! Hierarchical configuration passed at the configure stage

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::parameters::parse_integer;

/// Errors raised by [`Configuration`] accessors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("No attribute '{attribute}' on <{element}>")]
    MissingAttribute { element: String, attribute: String },

    #[error("No value on <{element}>")]
    MissingValue { element: String },

    #[error("No child <{child}> under <{element}>")]
    MissingChild { element: String, child: String },

    #[error("<{element}> holds '{value}' which is not a valid {expected}")]
    Invalid {
        element: String,
        value: String,
        expected: &'static str,
    },
}

/// A named configuration node with an optional value, attributes and children
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Configuration>,
}

impl Configuration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Configuration) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Configuration] {
        &self.children
    }

    /// Children with the given element name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Configuration> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First child with the given name
    pub fn child(&self, name: &str) -> Option<&Configuration> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn require_child(&self, name: &str) -> Result<&Configuration, ConfigurationError> {
        self.child(name).ok_or_else(|| ConfigurationError::MissingChild {
            element: self.name.clone(),
            child: name.to_string(),
        })
    }

    /// Follow a dotted path of child names, e.g. `"pool.limits"`
    pub fn at_path(&self, path: &str) -> Option<&Configuration> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| node.child(segment))
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn attribute(&self, name: &str) -> Result<&str, ConfigurationError> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ConfigurationError::MissingAttribute {
                element: self.name.clone(),
                attribute: name.to_string(),
            })
    }

    pub fn attribute_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.attributes.get(name).map(String::as_str).unwrap_or(default)
    }

    pub fn attribute_as_integer(&self, name: &str) -> Result<i64, ConfigurationError> {
        let value = self.attribute(name)?;
        parse_integer(value).ok_or_else(|| self.invalid(value, "integer"))
    }

    pub fn attribute_as_bool(&self, name: &str) -> Result<bool, ConfigurationError> {
        let value = self.attribute(name)?;
        parse_bool(value).ok_or_else(|| self.invalid(value, "boolean"))
    }

    pub fn value(&self) -> Result<&str, ConfigurationError> {
        self.value
            .as_deref()
            .ok_or_else(|| ConfigurationError::MissingValue {
                element: self.name.clone(),
            })
    }

    pub fn value_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.value.as_deref().unwrap_or(default)
    }

    pub fn value_as_integer(&self) -> Result<i64, ConfigurationError> {
        let value = self.value()?;
        parse_integer(value).ok_or_else(|| self.invalid(value, "integer"))
    }

    pub fn value_as_integer_or(&self, default: i64) -> i64 {
        self.value_as_integer().unwrap_or(default)
    }

    pub fn value_as_float(&self) -> Result<f64, ConfigurationError> {
        let value = self.value()?;
        value.trim().parse().map_err(|_| self.invalid(value, "float"))
    }

    pub fn value_as_bool(&self) -> Result<bool, ConfigurationError> {
        let value = self.value()?;
        parse_bool(value).ok_or_else(|| self.invalid(value, "boolean"))
    }

    pub fn value_as_bool_or(&self, default: bool) -> bool {
        self.value_as_bool().unwrap_or(default)
    }

    fn invalid(&self, value: &str, expected: &'static str) -> ConfigurationError {
        ConfigurationError::Invalid {
            element: self.name.clone(),
            value: value.to_string(),
            expected,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
