use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Application command option types used by docbot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionType {
    String = 3,
    Integer = 4,
    Boolean = 5,
}

impl Serialize for OptionType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionChoice {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandOptionDefinition {
    #[serde(rename = "type")]
    pub kind: OptionType,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub autocomplete: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<OptionChoice>,
}

impl CommandOptionDefinition {
    pub fn new(kind: OptionType, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: description.into(),
            required: false,
            autocomplete: false,
            choices: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn autocomplete(mut self) -> Self {
        self.autocomplete = true;
        self
    }

    pub fn choice(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.choices.push(OptionChoice { name: name.into(), value: value.into() });
        self
    }
}

/// Slash-command definition as published to the application commands endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandDefinition {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOptionDefinition>,
    pub dm_permission: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("command name `{0}` must be 1-32 lowercase letters, digits, `-` or `_`")]
    InvalidName(String),
    #[error("description for `{0}` must be 1-100 characters")]
    InvalidDescription(String),
    #[error("command `{command}` has {count} options, limit is 25")]
    TooManyOptions { command: String, count: usize },
    #[error("required option `{option}` of `{command}` follows an optional one")]
    RequiredAfterOptional { command: String, option: String },
}

impl CommandDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
            dm_permission: true,
        }
    }

    pub fn option(mut self, option: CommandOptionDefinition) -> Self {
        self.options.push(option);
        self
    }

    pub fn guild_only(mut self) -> Self {
        self.dm_permission = false;
        self
    }

    pub fn usage(&self) -> String {
        let mut usage = format!("/{}", self.name);
        for option in &self.options {
            if option.required {
                usage.push_str(&format!(" <{}>", option.name));
            } else {
                usage.push_str(&format!(" [{}]", option.name));
            }
        }
        usage
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        validate_name(&self.name)?;
        validate_description(&self.name, &self.description)?;

        if self.options.len() > 25 {
            return Err(DefinitionError::TooManyOptions {
                command: self.name.clone(),
                count: self.options.len(),
            });
        }

        let mut seen_optional = false;
        for option in &self.options {
            validate_name(&option.name)?;
            validate_description(&option.name, &option.description)?;
            if option.required && seen_optional {
                return Err(DefinitionError::RequiredAfterOptional {
                    command: self.name.clone(),
                    option: option.name.clone(),
                });
            }
            seen_optional |= !option.required;
        }

        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), DefinitionError> {
    let valid_chars = name
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_');
    if name.is_empty() || name.chars().count() > 32 || !valid_chars {
        return Err(DefinitionError::InvalidName(name.to_owned()));
    }
    Ok(())
}

fn validate_description(owner: &str, description: &str) -> Result<(), DefinitionError> {
    let length = description.chars().count();
    if length == 0 || length > 100 {
        return Err(DefinitionError::InvalidDescription(owner.to_owned()));
    }
    Ok(())
}

/// One option value supplied with a command or autocomplete interaction.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub focused: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandOptions(Vec<CommandOption>);

impl CommandOptions {
    pub fn new(options: Vec<CommandOption>) -> Self {
        Self(options)
    }

    pub fn get(&self, name: &str) -> Option<&CommandOption> {
        self.0.iter().find(|option| option.name == name)
    }

    /// String value, trimmed; blank strings count as absent.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|option| option.value.as_str())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|option| option.value.as_bool())
    }

    pub fn focused(&self) -> Option<&CommandOption> {
        self.0.iter().find(|option| option.focused)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        CommandDefinition, CommandOption, CommandOptionDefinition, CommandOptions, DefinitionError,
        OptionType,
    };

    fn djs_definition() -> CommandDefinition {
        CommandDefinition::new("djs", "Search discord.js documentation")
            .option(
                CommandOptionDefinition::new(OptionType::String, "query", "What to look up")
                    .required()
                    .autocomplete(),
            )
            .option(
                CommandOptionDefinition::new(OptionType::String, "source", "Docs branch")
                    .choice("stable", "stable")
                    .choice("main", "main"),
            )
            .option(CommandOptionDefinition::new(OptionType::Boolean, "private", "Include private"))
    }

    #[test]
    fn serializes_to_application_command_shape() {
        let value = serde_json::to_value(djs_definition()).expect("serialize");
        assert_eq!(value["name"], "djs");
        assert_eq!(value["dm_permission"], true);
        assert_eq!(value["options"][0], json!({
            "type": 3,
            "name": "query",
            "description": "What to look up",
            "required": true,
            "autocomplete": true
        }));
        assert_eq!(value["options"][1]["choices"][1], json!({"name": "main", "value": "main"}));
        assert_eq!(value["options"][2]["type"], 5);
        assert!(value["options"][2].get("required").is_none());
    }

    #[test]
    fn usage_marks_required_and_optional_options() {
        assert_eq!(djs_definition().usage(), "/djs <query> [source] [private]");
    }

    #[test]
    fn validation_rejects_bad_names_and_ordering() {
        assert!(djs_definition().validate().is_ok());

        let bad_name = CommandDefinition::new("Djs", "Search");
        assert_eq!(bad_name.validate(), Err(DefinitionError::InvalidName("Djs".to_owned())));

        let misordered = CommandDefinition::new("mdn", "Search MDN")
            .option(CommandOptionDefinition::new(OptionType::String, "lang", "Locale"))
            .option(CommandOptionDefinition::new(OptionType::String, "query", "Query").required());
        assert!(matches!(
            misordered.validate(),
            Err(DefinitionError::RequiredAfterOptional { ref option, .. }) if option == "query"
        ));
    }

    #[test]
    fn option_accessors_read_typed_values() {
        let options: Vec<CommandOption> = serde_json::from_value(json!([
            {"name": "query", "type": 3, "value": "  Guild#members ", "focused": true},
            {"name": "private", "type": 5, "value": true},
            {"name": "source", "type": 3, "value": "   "}
        ]))
        .expect("options");
        let options = CommandOptions::new(options);

        assert_eq!(options.get_str("query"), Some("Guild#members"));
        assert_eq!(options.get_bool("private"), Some(true));
        assert_eq!(options.get_str("source"), None, "blank strings are absent");
        assert_eq!(options.focused().map(|option| option.name.as_str()), Some("query"));
        assert_eq!(options.len(), 3);
    }
}
