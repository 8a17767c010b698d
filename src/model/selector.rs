// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Candidate selectors used by element discovery.
//!
//! Supports the compound subset the editor needs: an optional tag, any number of `.class`
//! tokens and attribute filters (`[attr]`, `[attr="v"]`, `[attr*="v"]`).

use std::fmt;
use std::str::FromStr;

use super::dom::{Document, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrFilter {
    Present(String),
    Equals(String, String),
    Contains(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("selector is empty")]
    Empty,
    #[error("unexpected character {found:?} at offset {offset} in selector {selector:?}")]
    Unexpected {
        selector: String,
        offset: usize,
        found: char,
    },
    #[error("unterminated attribute filter in selector {selector:?}")]
    Unterminated { selector: String },
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut selector = Self {
            source: source.to_owned(),
            tag: None,
            classes: Vec::new(),
            attrs: Vec::new(),
        };

        let bytes = source.as_bytes();
        let mut pos = 0;
        let tag_len = ident_len(&source[pos..]);
        if tag_len > 0 {
            selector.tag = Some(source[..tag_len].to_ascii_lowercase());
            pos = tag_len;
        }

        while pos < bytes.len() {
            match bytes[pos] {
                b'.' => {
                    let len = ident_len(&source[pos + 1..]);
                    if len == 0 {
                        return Err(unexpected(source, pos));
                    }
                    selector.classes.push(source[pos + 1..pos + 1 + len].to_owned());
                    pos += 1 + len;
                }
                b'[' => {
                    let Some(close) = source[pos..].find(']') else {
                        return Err(SelectorError::Unterminated {
                            selector: source.to_owned(),
                        });
                    };
                    let inner = &source[pos + 1..pos + close];
                    selector.attrs.push(parse_attr_filter(source, pos + 1, inner)?);
                    pos += close + 1;
                }
                _ => return Err(unexpected(source, pos)),
            }
        }

        if selector.tag.is_none() && selector.classes.is_empty() && selector.attrs.is_empty() {
            return Err(unexpected(source, 0));
        }
        Ok(selector)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(element) = doc.element(node) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if element.tag() != tag {
                return false;
            }
        }
        if !self.classes.iter().all(|class| element.has_class(class)) {
            return false;
        }
        self.attrs.iter().all(|filter| match filter {
            AttrFilter::Present(name) => element.has_attr(name),
            AttrFilter::Equals(name, value) => element.attr(name) == Some(value.as_str()),
            AttrFilter::Contains(name, needle) => {
                element.attr(name).is_some_and(|value| value.contains(needle.as_str()))
            }
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn ident_len(s: &str) -> usize {
    s.bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_')
        .count()
}

fn unexpected(source: &str, offset: usize) -> SelectorError {
    SelectorError::Unexpected {
        selector: source.to_owned(),
        offset,
        found: source[offset..].chars().next().unwrap_or(' '),
    }
}

fn parse_attr_filter(source: &str, offset: usize, inner: &str) -> Result<AttrFilter, SelectorError> {
    let name_len = ident_len(inner);
    if name_len == 0 {
        return Err(unexpected(source, offset));
    }
    let name = inner[..name_len].to_ascii_lowercase();
    let rest = inner[name_len..].trim();
    if rest.is_empty() {
        return Ok(AttrFilter::Present(name));
    }

    let (contains, value) = if let Some(value) = rest.strip_prefix("*=") {
        (true, value)
    } else if let Some(value) = rest.strip_prefix('=') {
        (false, value)
    } else {
        return Err(unexpected(source, offset + name_len));
    };

    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
        .to_owned();

    Ok(if contains {
        AttrFilter::Contains(name, value)
    } else {
        AttrFilter::Equals(name, value)
    })
}
