use docbot_core::custom_id::{CustomId, CustomIdError};
use serde::Serialize;

pub const CONTENT_LIMIT: usize = 2_000;
pub const EMBED_TITLE_LIMIT: usize = 256;
pub const EMBED_DESCRIPTION_LIMIT: usize = 4_096;
pub const EMBED_FIELD_COUNT_LIMIT: usize = 25;
pub const EMBED_FIELD_NAME_LIMIT: usize = 256;
pub const EMBED_FIELD_VALUE_LIMIT: usize = 1_024;
pub const EMBED_FOOTER_LIMIT: usize = 2_048;
pub const EMBED_AUTHOR_LIMIT: usize = 256;
pub const EMBED_TOTAL_LIMIT: usize = 6_000;
pub const MESSAGE_EMBED_LIMIT: usize = 10;
pub const SELECT_OPTION_LIMIT: usize = 25;
pub const SELECT_TEXT_LIMIT: usize = 100;
pub const AUTOCOMPLETE_CHOICE_LIMIT: usize = 25;
pub const AUTOCOMPLETE_TEXT_LIMIT: usize = 100;

pub const EPHEMERAL_FLAG: u64 = 1 << 6;
pub const DELETE_BUTTON_PREFIX: &str = "deletebtn";

const ACTION_ROW_TYPE: u8 = 1;
const BUTTON_TYPE: u8 = 2;
const SELECT_MENU_TYPE: u8 = 3;

/// Cuts `text` to at most `limit` characters, ending with `…` when shortened.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_owned();
    }
    if limit == 0 {
        return String::new();
    }
    let mut cut: String = text.chars().take(limit - 1).collect();
    cut.push('…');
    cut
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedThumbnail {
    pub url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedThumbnail>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl AsRef<str>) -> Self {
        self.title = Some(truncate(title.as_ref(), EMBED_TITLE_LIMIT));
        self
    }

    pub fn description(mut self, description: impl AsRef<str>) -> Self {
        self.description = Some(truncate(description.as_ref(), EMBED_DESCRIPTION_LIMIT));
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn author(mut self, name: impl AsRef<str>, icon_url: Option<&str>) -> Self {
        self.author = Some(EmbedAuthor {
            name: truncate(name.as_ref(), EMBED_AUTHOR_LIMIT),
            icon_url: icon_url.map(str::to_owned),
        });
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(EmbedThumbnail { url: url.into() });
        self
    }

    /// Fields past the 25th are dropped; empty values are replaced by a
    /// zero-width space because the platform rejects blank field values.
    pub fn field(mut self, name: impl AsRef<str>, value: impl AsRef<str>, inline: bool) -> Self {
        if self.fields.len() >= EMBED_FIELD_COUNT_LIMIT {
            return self;
        }
        let value = if value.as_ref().trim().is_empty() { "\u{200b}" } else { value.as_ref() };
        self.fields.push(EmbedField {
            name: truncate(name.as_ref(), EMBED_FIELD_NAME_LIMIT),
            value: truncate(value, EMBED_FIELD_VALUE_LIMIT),
            inline,
        });
        self
    }

    pub fn footer(mut self, text: impl AsRef<str>) -> Self {
        self.footer = Some(EmbedFooter { text: truncate(text.as_ref(), EMBED_FOOTER_LIMIT) });
        self
    }

    pub fn total_chars(&self) -> usize {
        let count = |text: &Option<String>| text.as_deref().map_or(0, |text| text.chars().count());
        count(&self.title)
            + count(&self.description)
            + self.author.as_ref().map_or(0, |author| author.name.chars().count())
            + self.footer.as_ref().map_or(0, |footer| footer.text.chars().count())
            + self
                .fields
                .iter()
                .map(|field| field.name.chars().count() + field.value.chars().count())
                .sum::<usize>()
    }

    /// Shrinks the description, then drops trailing fields, until the embed fits
    /// the combined character limit.
    pub fn fit_total(mut self) -> Self {
        let mut overflow = self.total_chars().saturating_sub(EMBED_TOTAL_LIMIT);
        if overflow == 0 {
            return self;
        }

        if let Some(description) = self.description.take() {
            let length = description.chars().count();
            let keep = length.saturating_sub(overflow);
            overflow = overflow.saturating_sub(length - keep);
            if keep > 0 {
                self.description = Some(truncate(&description, keep));
            }
        }

        while overflow > 0 {
            let Some(field) = self.fields.pop() else {
                break;
            };
            let freed = field.name.chars().count() + field.value.chars().count();
            overflow = overflow.saturating_sub(freed);
        }

        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary = 1,
    Secondary = 2,
    Success = 3,
    Danger = 4,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Emoji {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    kind: u8,
    pub style: u8,
    pub custom_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<Emoji>,
}

impl Button {
    pub fn new(custom_id: &CustomId, style: ButtonStyle) -> Result<Self, CustomIdError> {
        Ok(Self {
            kind: BUTTON_TYPE,
            style: style as u8,
            custom_id: custom_id.encode()?,
            label: None,
            emoji: None,
        })
    }

    pub fn label(mut self, label: impl AsRef<str>) -> Self {
        self.label = Some(truncate(label.as_ref(), 80));
        self
    }

    pub fn emoji(mut self, name: impl Into<String>) -> Self {
        self.emoji = Some(Emoji { name: name.into() });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SelectOption {
    pub fn new(label: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        Self {
            label: truncate(label.as_ref(), SELECT_TEXT_LIMIT),
            value: truncate(value.as_ref(), SELECT_TEXT_LIMIT),
            description: None,
        }
    }

    pub fn description(mut self, description: impl AsRef<str>) -> Self {
        let description = description.as_ref().trim();
        if !description.is_empty() {
            self.description = Some(truncate(description, SELECT_TEXT_LIMIT));
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectMenu {
    #[serde(rename = "type")]
    kind: u8,
    pub custom_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub options: Vec<SelectOption>,
}

impl SelectMenu {
    pub fn new(custom_id: &CustomId) -> Result<Self, CustomIdError> {
        Ok(Self {
            kind: SELECT_MENU_TYPE,
            custom_id: custom_id.encode()?,
            placeholder: None,
            options: Vec::new(),
        })
    }

    pub fn placeholder(mut self, placeholder: impl AsRef<str>) -> Self {
        self.placeholder = Some(truncate(placeholder.as_ref(), 150));
        self
    }

    /// Options beyond the 25th are ignored.
    pub fn option(mut self, option: SelectOption) -> Self {
        if self.options.len() < SELECT_OPTION_LIMIT {
            self.options.push(option);
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Component {
    Button(Button),
    SelectMenu(SelectMenu),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    pub components: Vec<Component>,
}

impl ActionRow {
    pub fn new() -> Self {
        Self { kind: ACTION_ROW_TYPE, components: Vec::new() }
    }

    pub fn button(mut self, button: Button) -> Self {
        self.components.push(Component::Button(button));
        self
    }

    pub fn select_menu(mut self, menu: SelectMenu) -> Self {
        self.components.push(Component::SelectMenu(menu));
        self
    }
}

impl Default for ActionRow {
    fn default() -> Self {
        Self::new()
    }
}

/// Message body for edits and follow-ups. `None` leaves a part of an existing
/// message untouched; `Some(vec![])` clears it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<Embed>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ActionRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl MessagePayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(content: impl AsRef<str>) -> Self {
        Self::new().content(content)
    }

    pub fn content(mut self, content: impl AsRef<str>) -> Self {
        self.content = Some(truncate(content.as_ref(), CONTENT_LIMIT));
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        let embeds = self.embeds.get_or_insert_with(Vec::new);
        if embeds.len() < MESSAGE_EMBED_LIMIT {
            embeds.push(embed.fit_total());
        }
        self
    }

    pub fn row(mut self, row: ActionRow) -> Self {
        self.components.get_or_insert_with(Vec::new).push(row);
        self
    }

    pub fn clear_components(mut self) -> Self {
        self.components = Some(Vec::new());
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.flags = Some(self.flags.unwrap_or(0) | EPHEMERAL_FLAG);
        self
    }

    pub fn is_ephemeral(&self) -> bool {
        self.flags.is_some_and(|flags| flags & EPHEMERAL_FLAG != 0)
    }

    pub fn select_menus(&self) -> impl Iterator<Item = &SelectMenu> {
        self.components.iter().flatten().flat_map(|row| &row.components).filter_map(|component| {
            match component {
                Component::SelectMenu(menu) => Some(menu),
                Component::Button(_) => None,
            }
        })
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.components.iter().flatten().flat_map(|row| &row.components).filter_map(|component| {
            match component {
                Component::Button(button) => Some(button),
                Component::SelectMenu(_) => None,
            }
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AutocompleteChoice {
    pub name: String,
    pub value: String,
}

impl AutocompleteChoice {
    pub fn new(name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        Self {
            name: truncate(name.as_ref(), AUTOCOMPLETE_TEXT_LIMIT),
            value: truncate(value.as_ref(), AUTOCOMPLETE_TEXT_LIMIT),
        }
    }

    pub fn same(text: impl AsRef<str>) -> Self {
        Self::new(text.as_ref(), text.as_ref())
    }
}

/// Trash-can button that lets `owner_id` remove a public documentation message.
pub fn delete_button(owner_id: &str) -> Result<Button, CustomIdError> {
    Ok(Button::new(&CustomId::new(DELETE_BUTTON_PREFIX).param(owner_id), ButtonStyle::Secondary)?
        .emoji("🗑"))
}

pub fn delete_row(owner_id: &str) -> Result<ActionRow, CustomIdError> {
    Ok(ActionRow::new().button(delete_button(owner_id)?))
}

/// The ephemeral placeholder after a selection: confirmation text, menu removed.
pub fn sent_confirmation(label: &str) -> MessagePayload {
    MessagePayload::text(format!("Sent documentations for {label}")).clear_components()
}

/// Public message carrying one documentation embed and its delete button.
pub fn documentation_message(
    embed: Embed,
    owner_id: &str,
) -> Result<MessagePayload, CustomIdError> {
    Ok(MessagePayload::new().embed(embed).row(delete_row(owner_id)?))
}
