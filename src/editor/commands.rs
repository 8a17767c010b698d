// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Named formatting commands applied to the active element.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::model::{EditType, NodeId};
use crate::protocol::OutboundMessage;

use super::{append_content_child, content_children, rendered_text, EditorSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Paragraph,
}

impl HeadingLevel {
    /// Accepts `h1`..`h6`, `p`, `paragraph`, optionally wrapped in angle brackets.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().trim_start_matches('<').trim_end_matches('>');
        Some(match value.to_ascii_lowercase().as_str() {
            "h1" => Self::H1,
            "h2" => Self::H2,
            "h3" => Self::H3,
            "h4" => Self::H4,
            "h5" => Self::H5,
            "h6" => Self::H6,
            "p" | "paragraph" => Self::Paragraph,
            _ => return None,
        })
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::H1 => "h1",
            Self::H2 => "h2",
            Self::H3 => "h3",
            Self::H4 => "h4",
            Self::H5 => "h5",
            Self::H6 => "h6",
            Self::Paragraph => "p",
        }
    }
}

/// A CSS font size. Legacy sizes `1`..`7` map onto pixel values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSize(String);

const LEGACY_FONT_SIZES: [&str; 7] = ["10px", "13px", "16px", "18px", "24px", "32px", "48px"];

impl FontSize {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(legacy) = value.parse::<usize>() {
            return legacy
                .checked_sub(1)
                .and_then(|index| LEGACY_FONT_SIZES.get(index))
                .map(|px| Self((*px).to_owned()));
        }
        css_length_pattern()
            .is_match(value)
            .then(|| Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Bold,
    Italic,
    Underline,
    UnorderedList,
    ForeColor(String),
    HiliteColor(String),
    FormatBlock(HeadingLevel),
    FontSize(FontSize),
    InsertImage(String),
    InsertVideo(String),
    Delete,
    AiAssist(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("command `{command}` needs a value")]
    MissingValue { command: &'static str },
    #[error("invalid value {value:?} for command `{command}`")]
    InvalidValue {
        command: &'static str,
        value: String,
    },
    #[error("command `{command}` does not apply to images")]
    UnsupportedForImage { command: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    /// Nothing was active; commands need an active element.
    NoActiveElement,
    /// The command was valid but would not change anything.
    Unchanged,
    Rejected(CommandError),
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

impl Command {
    /// Parses a command from its bridge name (`bold`, `foreColor`, `formatBlock`, ...).
    pub fn parse(name: &str, value: Option<&str>) -> Result<Self, CommandError> {
        let command = match name.trim().to_ascii_lowercase().as_str() {
            "bold" => Self::Bold,
            "italic" => Self::Italic,
            "underline" => Self::Underline,
            "insertunorderedlist" => Self::UnorderedList,
            "forecolor" => Self::ForeColor(color("foreColor", value)?),
            "hilitecolor" | "backcolor" => Self::HiliteColor(color("hiliteColor", value)?),
            "formatblock" => {
                let raw = required("formatBlock", value)?;
                Self::FormatBlock(
                    HeadingLevel::parse(raw).ok_or_else(|| invalid("formatBlock", raw))?,
                )
            }
            "fontsize" => {
                let raw = required("fontSize", value)?;
                Self::FontSize(FontSize::parse(raw).ok_or_else(|| invalid("fontSize", raw))?)
            }
            "insertimage" => Self::InsertImage(media_url("insertImage", value)?),
            "insertvideo" => Self::InsertVideo(media_url("insertVideo", value)?),
            "delete" => Self::Delete,
            "aiassist" => {
                let prompt = required("aiAssist", value)?.trim();
                if prompt.is_empty() {
                    return Err(invalid("aiAssist", prompt));
                }
                Self::AiAssist(prompt.to_owned())
            }
            _ => return Err(CommandError::Unknown(name.to_owned())),
        };
        Ok(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bold => "bold",
            Self::Italic => "italic",
            Self::Underline => "underline",
            Self::UnorderedList => "insertUnorderedList",
            Self::ForeColor(_) => "foreColor",
            Self::HiliteColor(_) => "hiliteColor",
            Self::FormatBlock(_) => "formatBlock",
            Self::FontSize(_) => "fontSize",
            Self::InsertImage(_) => "insertImage",
            Self::InsertVideo(_) => "insertVideo",
            Self::Delete => "delete",
            Self::AiAssist(_) => "aiAssist",
        }
    }

    fn applies_to_images(&self) -> bool {
        matches!(self, Self::InsertImage(_) | Self::Delete)
    }
}

fn required<'a>(command: &'static str, value: Option<&'a str>) -> Result<&'a str, CommandError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(CommandError::MissingValue { command })
}

fn invalid(command: &'static str, value: &str) -> CommandError {
    CommandError::InvalidValue {
        command,
        value: value.to_owned(),
    }
}

fn color(command: &'static str, value: Option<&str>) -> Result<String, CommandError> {
    let raw = required(command, value)?.trim();
    if color_pattern().is_match(raw) {
        Ok(raw.to_owned())
    } else {
        Err(invalid(command, raw))
    }
}

fn media_url(command: &'static str, value: Option<&str>) -> Result<String, CommandError> {
    let raw = required(command, value)?.trim();
    if url_pattern().is_match(raw) {
        Ok(raw.to_owned())
    } else {
        Err(invalid(command, raw))
    }
}

fn color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(#([0-9a-f]{3}|[0-9a-f]{4}|[0-9a-f]{6}|[0-9a-f]{8})|(rgb|hsl)a?\([0-9.,%\s]+\)|[a-z]{3,20})$",
        )
        .expect("color pattern is valid")
    })
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?i)^(https?://[^\s"'<>]+|/[^\s"'<>]*|data:(image|video)/[a-z0-9.+-]+;base64,[a-z0-9+/=]+)$"#,
        )
        .expect("url pattern is valid")
    })
}

fn css_length_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\d{1,3}(\.\d{1,2})?(px|pt|em|rem|%)$")
            .expect("length pattern is valid")
    })
}

impl EditorSession {
    /// Applies `command` to the active element. Failures are logged and leave the document as is.
    pub fn execute(&mut self, command: Command) -> CommandOutcome {
        let Some(active) = self.active.clone() else {
            debug!(command = command.name(), "command ignored: nothing active");
            return CommandOutcome::NoActiveElement;
        };
        if active.edit_type == EditType::Image && !command.applies_to_images() {
            let err = CommandError::UnsupportedForImage {
                command: command.name(),
            };
            warn!(element_id = %active.element_id, error = %err, "command rejected");
            return CommandOutcome::Rejected(err);
        }

        let node = active.node;
        debug!(element_id = %active.element_id, command = command.name(), "executing command");
        match command {
            Command::Bold => self.toggle_style(node, "Bold", "font-weight", "bold"),
            Command::Italic => self.toggle_style(node, "Italic", "font-style", "italic"),
            Command::Underline => self.toggle_underline(node),
            Command::UnorderedList => self.toggle_list(node),
            Command::ForeColor(color) => self.restyle(node, "Text color", "color", &color),
            Command::HiliteColor(color) => {
                self.restyle(node, "Highlight color", "background-color", &color)
            }
            Command::FormatBlock(level) => self.change_tag(node, level),
            Command::FontSize(size) => {
                self.save_history_state("Font size");
                self.doc.set_style(node, "font-size", Some(size.as_str()));
                self.deactivate();
                self.activate(node);
                self.content_changed(node);
                CommandOutcome::Applied
            }
            Command::InsertImage(url) => match active.edit_type {
                EditType::Image => {
                    if self.doc.attr(node, "src") == Some(url.as_str()) {
                        return CommandOutcome::Unchanged;
                    }
                    self.save_history_state("Replace image");
                    self.doc.set_attr(node, "src", url);
                    self.content_changed(node);
                    CommandOutcome::Applied
                }
                EditType::Text => {
                    self.save_history_state("Insert image");
                    let img = self.doc.create_element("img");
                    self.doc.set_attr(img, "src", url);
                    self.doc.set_attr(img, "alt", "");
                    self.doc.set_style(img, "max-width", Some("100%"));
                    self.doc.set_style(img, "height", Some("auto"));
                    append_content_child(&mut self.doc, node, img);
                    self.content_changed(node);
                    CommandOutcome::Applied
                }
            },
            Command::InsertVideo(url) => {
                self.save_history_state("Insert video");
                let video = self.doc.create_element("video");
                self.doc.set_attr(video, "src", url);
                self.doc.set_attr(video, "controls", "");
                self.doc.set_style(video, "max-width", Some("100%"));
                append_content_child(&mut self.doc, node, video);
                self.content_changed(node);
                CommandOutcome::Applied
            }
            Command::Delete => {
                if self.delete_element(node) {
                    CommandOutcome::Applied
                } else {
                    CommandOutcome::Unchanged
                }
            }
            Command::AiAssist(prompt) => {
                let text = rendered_text(&self.doc, node).trim().to_owned();
                self.post(OutboundMessage::AiAssist {
                    element_id: active.element_id,
                    text,
                    prompt,
                });
                CommandOutcome::Applied
            }
        }
    }

    fn toggle_style(
        &mut self,
        node: NodeId,
        description: &str,
        property: &str,
        value: &str,
    ) -> CommandOutcome {
        self.save_history_state(description);
        let on = self.doc.style(node, property).as_deref() == Some(value);
        self.doc
            .set_style(node, property, if on { None } else { Some(value) });
        self.content_changed(node);
        CommandOutcome::Applied
    }

    fn restyle(
        &mut self,
        node: NodeId,
        description: &str,
        property: &str,
        value: &str,
    ) -> CommandOutcome {
        if self.doc.style(node, property).as_deref() == Some(value) {
            return CommandOutcome::Unchanged;
        }
        self.save_history_state(description);
        self.doc.set_style(node, property, Some(value));
        self.content_changed(node);
        CommandOutcome::Applied
    }

    fn toggle_underline(&mut self, node: NodeId) -> CommandOutcome {
        self.save_history_state("Underline");
        let current = self.doc.style(node, "text-decoration").unwrap_or_default();
        let mut tokens = current.split_whitespace().collect::<Vec<_>>();
        if let Some(index) = tokens.iter().position(|t| *t == "underline") {
            tokens.remove(index);
        } else {
            tokens.push("underline");
        }
        let next = tokens.join(" ");
        self.doc.set_style(
            node,
            "text-decoration",
            (!next.is_empty()).then_some(next.as_str()),
        );
        self.content_changed(node);
        CommandOutcome::Applied
    }

    /// Wraps the element's content in `<ul><li>`, or unwraps a list it already is.
    fn toggle_list(&mut self, node: NodeId) -> CommandOutcome {
        self.save_history_state("Bullet list");
        let content = content_children(&self.doc, node);
        let existing_list = match content.as_slice() {
            [only] if self.doc.tag(*only) == Some("ul") => Some(*only),
            _ => None,
        };

        match existing_list {
            Some(list) => {
                for item in self.doc.children(list).to_vec() {
                    for child in self.doc.children(item).to_vec() {
                        append_content_child(&mut self.doc, node, child);
                    }
                }
                self.doc.remove(list);
            }
            None => {
                let list = self.doc.create_element("ul");
                let item = self.doc.create_element("li");
                for child in content {
                    self.doc.append_child(item, child);
                }
                self.doc.append_child(list, item);
                append_content_child(&mut self.doc, node, list);
            }
        }
        self.content_changed(node);
        CommandOutcome::Applied
    }

    /// Swaps the element for one with a different tag and re-activates the replacement.
    fn change_tag(&mut self, node: NodeId, level: HeadingLevel) -> CommandOutcome {
        let tag = level.tag();
        if self.doc.tag(node) == Some(tag) {
            return CommandOutcome::Unchanged;
        }
        self.save_history_state(&format!("Change to {tag}"));
        self.deactivate();

        let attrs = self
            .doc
            .element(node)
            .map(|element| {
                element
                    .attrs()
                    .map(|(name, value)| (name.to_owned(), value.to_owned()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let layout = self.doc.layout(node);
        let replacement = self.doc.create_element(tag);
        for (name, value) in attrs {
            self.doc.set_attr(replacement, &name, value);
        }
        self.doc.move_children(node, replacement);
        if !self.doc.replace(node, replacement) {
            warn!("heading change lost its target");
            self.doc.remove(replacement);
            return CommandOutcome::Unchanged;
        }
        self.doc.set_layout(replacement, layout);
        self.activate(replacement);
        self.content_changed(replacement);
        CommandOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{Command, CommandError, FontSize, HeadingLevel};

    #[rstest]
    #[case("bold", None, Command::Bold)]
    #[case("insertUnorderedList", None, Command::UnorderedList)]
    #[case("foreColor", Some("#ff0000"), Command::ForeColor("#ff0000".into()))]
    #[case("hiliteColor", Some("rgb(255, 255, 0)"), Command::HiliteColor("rgb(255, 255, 0)".into()))]
    #[case("formatBlock", Some("<h2>"), Command::FormatBlock(HeadingLevel::H2))]
    #[case("formatBlock", Some("p"), Command::FormatBlock(HeadingLevel::Paragraph))]
    #[case("fontSize", Some("5"), Command::FontSize(FontSize("24px".into())))]
    #[case("fontSize", Some("1.5rem"), Command::FontSize(FontSize("1.5rem".into())))]
    #[case("insertImage", Some("https://cdn.example.com/a.png"), Command::InsertImage("https://cdn.example.com/a.png".into()))]
    #[case("aiAssist", Some("  make it shorter "), Command::AiAssist("make it shorter".into()))]
    fn parses_bridge_commands(
        #[case] name: &str,
        #[case] value: Option<&str>,
        #[case] expected: Command,
    ) {
        assert_eq!(Command::parse(name, value), Ok(expected));
    }

    #[rstest]
    #[case("strikeThrough", None)]
    #[case("foreColor", Some("red; background: url(x)"))]
    #[case("foreColor", None)]
    #[case("formatBlock", Some("h7"))]
    #[case("fontSize", Some("9"))]
    #[case("insertImage", Some("javascript:alert(1)"))]
    #[case("insertVideo", Some("https://example.com/a b.mp4"))]
    #[case("aiAssist", Some("   "))]
    fn rejects_bad_commands(#[case] name: &str, #[case] value: Option<&str>) {
        assert!(Command::parse(name, value).is_err());
    }

    #[test]
    fn unknown_command_keeps_its_name() {
        assert_eq!(
            Command::parse("justifyLeft", None),
            Err(CommandError::Unknown("justifyLeft".into()))
        );
    }
}
