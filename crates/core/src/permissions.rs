use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discord permission bitfield, as delivered in interaction payloads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(u64);

const NAMED_PERMISSIONS: &[(u64, &str)] = &[
    (1 << 0, "CREATE_INSTANT_INVITE"),
    (1 << 1, "KICK_MEMBERS"),
    (1 << 2, "BAN_MEMBERS"),
    (1 << 3, "ADMINISTRATOR"),
    (1 << 4, "MANAGE_CHANNELS"),
    (1 << 5, "MANAGE_GUILD"),
    (1 << 6, "ADD_REACTIONS"),
    (1 << 7, "VIEW_AUDIT_LOG"),
    (1 << 8, "PRIORITY_SPEAKER"),
    (1 << 9, "STREAM"),
    (1 << 10, "VIEW_CHANNEL"),
    (1 << 11, "SEND_MESSAGES"),
    (1 << 12, "SEND_TTS_MESSAGES"),
    (1 << 13, "MANAGE_MESSAGES"),
    (1 << 14, "EMBED_LINKS"),
    (1 << 15, "ATTACH_FILES"),
    (1 << 16, "READ_MESSAGE_HISTORY"),
    (1 << 17, "MENTION_EVERYONE"),
    (1 << 18, "USE_EXTERNAL_EMOJIS"),
    (1 << 19, "VIEW_GUILD_INSIGHTS"),
    (1 << 20, "CONNECT"),
    (1 << 21, "SPEAK"),
    (1 << 22, "MUTE_MEMBERS"),
    (1 << 23, "DEAFEN_MEMBERS"),
    (1 << 24, "MOVE_MEMBERS"),
    (1 << 25, "USE_VAD"),
    (1 << 26, "CHANGE_NICKNAME"),
    (1 << 27, "MANAGE_NICKNAMES"),
    (1 << 28, "MANAGE_ROLES"),
    (1 << 29, "MANAGE_WEBHOOKS"),
    (1 << 30, "MANAGE_GUILD_EXPRESSIONS"),
    (1 << 31, "USE_APPLICATION_COMMANDS"),
    (1 << 32, "REQUEST_TO_SPEAK"),
    (1 << 33, "MANAGE_EVENTS"),
    (1 << 34, "MANAGE_THREADS"),
    (1 << 35, "CREATE_PUBLIC_THREADS"),
    (1 << 36, "CREATE_PRIVATE_THREADS"),
    (1 << 37, "USE_EXTERNAL_STICKERS"),
    (1 << 38, "SEND_MESSAGES_IN_THREADS"),
    (1 << 39, "USE_EMBEDDED_ACTIVITIES"),
    (1 << 40, "MODERATE_MEMBERS"),
];

impl Permissions {
    pub const ADMINISTRATOR: Self = Self(1 << 3);
    pub const VIEW_CHANNEL: Self = Self(1 << 10);
    pub const SEND_MESSAGES: Self = Self(1 << 11);
    pub const MANAGE_MESSAGES: Self = Self(1 << 13);
    pub const EMBED_LINKS: Self = Self(1 << 14);
    pub const READ_MESSAGE_HISTORY: Self = Self(1 << 16);
    pub const USE_EXTERNAL_EMOJIS: Self = Self(1 << 18);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Capabilities in `required` that this set lacks. Administrator implies everything.
    pub fn missing(self, required: Self) -> Self {
        if self.contains(Self::ADMINISTRATOR) {
            return Self::empty();
        }
        Self(required.0 & !self.0)
    }

    pub fn names(self) -> Vec<String> {
        (0..64)
            .map(|bit| 1_u64 << bit)
            .filter(|flag| self.0 & flag != 0)
            .map(|flag| {
                NAMED_PERMISSIONS
                    .iter()
                    .find(|(named, _)| *named == flag)
                    .map(|(_, name)| (*name).to_owned())
                    .unwrap_or_else(|| format!("UNKNOWN_{}", flag.trailing_zeros()))
            })
            .collect()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_uppercase();
        NAMED_PERMISSIONS
            .iter()
            .find(|(_, candidate)| *candidate == normalized)
            .map(|(bits, _)| Self(*bits))
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered =
            self.names().iter().map(|name| format!("`{name}`")).collect::<Vec<_>>().join(", ");
        f.write_str(&rendered)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid permission bitfield `{0}`")]
pub struct PermissionParseError(pub String);

impl FromStr for Permissions {
    type Err = PermissionParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| PermissionParseError(value.to_owned()))
    }
}

/// Where an interaction happened, with the effective permissions already resolved
/// for that channel by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateLocation {
    Private,
    Guild { bot: Permissions, actor: Permissions },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Requirements {
    pub bot: Option<Permissions>,
    pub actor: Option<Permissions>,
    pub guild_only: bool,
}

impl Requirements {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn bot(mut self, permissions: Permissions) -> Self {
        self.bot = Some(permissions);
        self
    }

    pub fn actor(mut self, permissions: Permissions) -> Self {
        self.actor = Some(permissions);
        self
    }

    pub fn guild_only(mut self) -> Self {
        self.guild_only = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DenyReason {
    ServerOnly,
    BotMissing(Permissions),
    ActorMissing(Permissions),
}

impl DenyReason {
    pub fn user_message(&self) -> String {
        match self {
            Self::ServerOnly => {
                "This is a guild exclusive command, not to be executed in a dm".to_owned()
            }
            Self::BotMissing(missing) => {
                format!("In order to run this command, I need the following permissions: {missing}")
            }
            Self::ActorMissing(missing) => {
                format!("In order to run this command, you need: {missing}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny(DenyReason),
}

pub fn check(location: &GateLocation, requirements: &Requirements) -> GateDecision {
    let (bot, actor) = match location {
        GateLocation::Private if requirements.guild_only => {
            return GateDecision::Deny(DenyReason::ServerOnly);
        }
        GateLocation::Private => return GateDecision::Allow,
        GateLocation::Guild { bot, actor } => (*bot, *actor),
    };

    if let Some(required) = requirements.bot {
        let missing = bot.missing(required);
        if !missing.is_empty() {
            return GateDecision::Deny(DenyReason::BotMissing(missing));
        }
    }

    if let Some(required) = requirements.actor {
        let missing = actor.missing(required);
        if !missing.is_empty() {
            return GateDecision::Deny(DenyReason::ActorMissing(missing));
        }
    }

    GateDecision::Allow
}
