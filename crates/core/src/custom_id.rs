use std::fmt;

use thiserror::Error;

pub const CUSTOM_ID_SEPARATOR: char = '/';
/// Platform ceiling for component custom ids.
pub const CUSTOM_ID_MAX_LEN: usize = 100;

/// Routing key carried by buttons and select menus: a handler prefix followed by
/// contextual parameters, e.g. `djsselect/stable/false/80351110224678912`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CustomId {
    prefix: String,
    params: Vec<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CustomIdError {
    #[error("custom id parameter `{0}` contains the separator")]
    SeparatorInParam(String),
    #[error("encoded custom id is {0} characters, limit is {CUSTOM_ID_MAX_LEN}")]
    TooLong(usize),
}

impl CustomId {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), params: Vec::new() }
    }

    pub fn param(mut self, value: impl Into<String>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn parse(raw: &str) -> Self {
        let mut segments = raw.split(CUSTOM_ID_SEPARATOR);
        let prefix = segments.next().unwrap_or_default().to_owned();
        Self { prefix, params: segments.map(str::to_owned).collect() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    pub fn encode(&self) -> Result<String, CustomIdError> {
        if let Some(bad) = self.params.iter().find(|param| param.contains(CUSTOM_ID_SEPARATOR)) {
            return Err(CustomIdError::SeparatorInParam(bad.clone()));
        }
        let encoded = self.to_string();
        let length = encoded.chars().count();
        if length > CUSTOM_ID_MAX_LEN {
            return Err(CustomIdError::TooLong(length));
        }
        Ok(encoded)
    }
}

impl fmt::Display for CustomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)?;
        for param in &self.params {
            write!(f, "{CUSTOM_ID_SEPARATOR}{param}")?;
        }
        Ok(())
    }
}
