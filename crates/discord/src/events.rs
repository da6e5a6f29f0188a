use docbot_core::custom_id::CustomId;
use docbot_core::permissions::{GateLocation, Permissions};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::commands::{CommandOption, CommandOptions};

const INTERACTION_COMMAND: u64 = 2;
const INTERACTION_COMPONENT: u64 = 3;
const INTERACTION_AUTOCOMPLETE: u64 = 4;
const COMPONENT_BUTTON: u64 = 2;
const COMPONENT_SELECT_MENU: u64 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FocusedOption {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InteractionKind {
    Command { name: String, options: CommandOptions },
    Button { custom_id: CustomId },
    SelectMenu { custom_id: CustomId, values: Vec<String> },
    Autocomplete { command: String, focused: FocusedOption, options: CommandOptions },
    Unsupported { type_code: u64, component_type: Option<u64> },
}

impl InteractionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::Button { .. } => "button",
            Self::SelectMenu { .. } => "select_menu",
            Self::Autocomplete { .. } => "autocomplete",
            Self::Unsupported { .. } => "unsupported",
        }
    }
}

/// Everything a handler may need about one interaction, parsed once at the
/// gateway boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct InteractionContext {
    pub id: String,
    pub application_id: String,
    pub token: String,
    pub actor: Actor,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    /// Message the component is attached to; only set for buttons and menus.
    pub message_id: Option<String>,
    pub app_permissions: Option<Permissions>,
    pub member_permissions: Option<Permissions>,
    pub kind: InteractionKind,
    pub raw: Value,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InteractionParseError {
    #[error("interaction payload is malformed: {0}")]
    Malformed(String),
    #[error("interaction payload is missing `{0}`")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct RawInteraction {
    id: String,
    application_id: String,
    #[serde(rename = "type")]
    kind: u64,
    token: String,
    #[serde(default)]
    data: Option<RawData>,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    channel: Option<RawChannel>,
    #[serde(default)]
    member: Option<RawMember>,
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    app_permissions: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawData {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    options: Vec<CommandOption>,
    #[serde(default)]
    custom_id: Option<String>,
    #[serde(default)]
    component_type: Option<u64>,
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    permissions: Option<String>,
    #[serde(default)]
    nick: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    global_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
}

impl InteractionContext {
    pub fn from_value(raw: Value) -> Result<Self, InteractionParseError> {
        let parsed: RawInteraction = serde_json::from_value(raw.clone())
            .map_err(|error| InteractionParseError::Malformed(error.to_string()))?;

        let (member_user, nick, member_permissions) = match parsed.member {
            Some(member) => (member.user, member.nick, member.permissions),
            None => (None, None, None),
        };
        let user = member_user.or(parsed.user).ok_or(InteractionParseError::MissingField("user"))?;
        let name = nick.or(user.global_name).unwrap_or(user.username);

        let data = parsed.data.unwrap_or_default();
        let kind = classify(parsed.kind, data)?;

        Ok(Self {
            id: parsed.id,
            application_id: parsed.application_id,
            token: parsed.token,
            actor: Actor { id: user.id, name },
            guild_id: parsed.guild_id,
            channel_id: parsed.channel_id.or(parsed.channel.map(|channel| channel.id)),
            message_id: parsed.message.map(|message| message.id),
            app_permissions: parse_permissions(parsed.app_permissions.as_deref()),
            member_permissions: parse_permissions(member_permissions.as_deref()),
            kind,
            raw,
        })
    }

    /// Private context when there is no guild. Inside a guild, missing
    /// permission strings count as no permissions at all.
    pub fn location(&self) -> GateLocation {
        if self.guild_id.is_none() {
            return GateLocation::Private;
        }
        GateLocation::Guild {
            bot: self.app_permissions.unwrap_or_default(),
            actor: self.member_permissions.unwrap_or_default(),
        }
    }

    pub fn options(&self) -> Option<&CommandOptions> {
        match &self.kind {
            InteractionKind::Command { options, .. }
            | InteractionKind::Autocomplete { options, .. } => Some(options),
            _ => None,
        }
    }

    pub fn custom_id(&self) -> Option<&CustomId> {
        match &self.kind {
            InteractionKind::Button { custom_id }
            | InteractionKind::SelectMenu { custom_id, .. } => Some(custom_id),
            _ => None,
        }
    }

    pub fn selected_values(&self) -> &[String] {
        match &self.kind {
            InteractionKind::SelectMenu { values, .. } => values,
            _ => &[],
        }
    }

    /// Registry key the interaction routes by: command name or custom id prefix.
    pub fn route_key(&self) -> Option<&str> {
        match &self.kind {
            InteractionKind::Command { name, .. } => Some(name),
            InteractionKind::Button { custom_id }
            | InteractionKind::SelectMenu { custom_id, .. } => Some(custom_id.prefix()),
            InteractionKind::Autocomplete { command, .. } => Some(command),
            InteractionKind::Unsupported { .. } => None,
        }
    }
}

fn classify(type_code: u64, data: RawData) -> Result<InteractionKind, InteractionParseError> {
    match type_code {
        INTERACTION_COMMAND => {
            let name = data.name.ok_or(InteractionParseError::MissingField("data.name"))?;
            Ok(InteractionKind::Command { name, options: CommandOptions::new(data.options) })
        }
        INTERACTION_COMPONENT => {
            let custom_id = data.custom_id.as_deref().map(CustomId::parse);
            match (data.component_type, custom_id) {
                (Some(COMPONENT_BUTTON), Some(custom_id)) => {
                    Ok(InteractionKind::Button { custom_id })
                }
                (Some(COMPONENT_SELECT_MENU), Some(custom_id)) => {
                    Ok(InteractionKind::SelectMenu { custom_id, values: data.values })
                }
                (None, _) => Err(InteractionParseError::MissingField("data.component_type")),
                (Some(_), None) => Err(InteractionParseError::MissingField("data.custom_id")),
                (component_type, Some(_)) => {
                    Ok(InteractionKind::Unsupported { type_code, component_type })
                }
            }
        }
        INTERACTION_AUTOCOMPLETE => {
            let command = data.name.ok_or(InteractionParseError::MissingField("data.name"))?;
            let options = CommandOptions::new(data.options);
            let focused = options
                .focused()
                .map(|option| FocusedOption {
                    name: option.name.clone(),
                    value: option.value.as_str().unwrap_or_default().to_owned(),
                })
                .ok_or(InteractionParseError::MissingField("data.options[focused]"))?;
            Ok(InteractionKind::Autocomplete { command, focused, options })
        }
        other => Ok(InteractionKind::Unsupported { type_code: other, component_type: None }),
    }
}

fn parse_permissions(raw: Option<&str>) -> Option<Permissions> {
    raw.and_then(|bits| bits.parse().ok())
}


#[cfg(test)]
mod tests {
    use docbot_core::permissions::{GateLocation, Permissions};
    use serde_json::json;

    use super::fixtures::{component, guild_command};
    use super::{InteractionContext, InteractionKind, InteractionParseError};

    #[test]
    fn parses_guild_command_with_permissions() {
        let context = InteractionContext::from_value(guild_command(
            "djs",
            json!([{"name": "query", "type": 3, "value": "Guild"}]),
        ))
        .expect("command");

        assert_eq!(context.actor.id, "501");
        assert_eq!(context.actor.name, "ada");
        assert_eq!(context.route_key(), Some("djs"));
        assert_eq!(context.options().and_then(|options| options.get_str("query")), Some("Guild"));
        assert_eq!(
            context.location(),
            GateLocation::Guild {
                bot: Permissions::EMBED_LINKS,
                actor: Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES,
            }
        );
    }

    #[test]
    fn direct_messages_are_private_and_use_top_level_user() {
        let context = InteractionContext::from_value(json!({
            "id": "1", "application_id": "900", "type": 2, "token": "t",
            "channel_id": "55",
            "user": {"id": "42", "username": "dm-user", "global_name": "DM User"},
            "data": {"name": "help"}
        }))
        .expect("dm command");

        assert_eq!(context.location(), GateLocation::Private);
        assert_eq!(context.actor.name, "DM User");
    }

    #[test]
    fn components_parse_custom_id_once() {
        let select = component(3, "djsselect/stable/false/501", &["Guild"], "501");
        let menu = InteractionContext::from_value(select).expect("menu");
        let Some(custom_id) = menu.custom_id() else { panic!("custom id expected") };
        assert_eq!(custom_id.prefix(), "djsselect");
        assert_eq!(custom_id.get(2), Some("501"));
        assert_eq!(menu.selected_values(), ["Guild"]);
        assert_eq!(menu.message_id.as_deref(), Some("1300"));

        let delete = component(2, "deletebtn/501", &[], "9");
        let button = InteractionContext::from_value(delete).expect("button");
        assert_eq!(button.kind.label(), "button");
    }

    #[test]
    fn autocomplete_requires_a_focused_option() {
        let payload = json!({
            "id": "1", "application_id": "900", "type": 4, "token": "t",
            "user": {"id": "42", "username": "u"},
            "data": {
                "name": "mdn",
                "options": [{"name": "query", "type": 3, "value": "arr", "focused": true}]
            }
        });
        let context = InteractionContext::from_value(payload).expect("autocomplete");
        let InteractionKind::Autocomplete { command, focused, .. } = &context.kind else {
            panic!("autocomplete expected");
        };
        assert_eq!(command, "mdn");
        assert_eq!(focused.value, "arr");

        let unfocused = json!({
            "id": "1", "application_id": "900", "type": 4, "token": "t",
            "user": {"id": "42", "username": "u"},
            "data": {"name": "mdn", "options": [{"name": "query", "type": 3, "value": "arr"}]}
        });
        assert!(matches!(
            InteractionContext::from_value(unfocused),
            Err(InteractionParseError::MissingField(_))
        ));
    }

    #[test]
    fn unknown_types_are_classified_unsupported() {
        let modal = json!({
            "id": "1", "application_id": "900", "type": 5, "token": "t",
            "user": {"id": "42", "username": "u"},
            "data": {"custom_id": "feedback"}
        });
        let context = InteractionContext::from_value(modal).expect("modal");
        assert_eq!(
            context.kind,
            InteractionKind::Unsupported { type_code: 5, component_type: None }
        );
        assert_eq!(context.route_key(), None);

        let user_select =
            InteractionContext::from_value(component(5, "pick", &["1"], "9")).expect("select");
        assert!(matches!(
            user_select.kind,
            InteractionKind::Unsupported { component_type: Some(5), .. }
        ));
    }

    #[test]
    fn missing_user_is_rejected() {
        let payload = json!({
            "id": "1", "application_id": "900", "type": 2, "token": "t",
            "data": {"name": "x"}
        });
        assert_eq!(
            InteractionContext::from_value(payload),
            Err(InteractionParseError::MissingField("user"))
        );
    }
}
