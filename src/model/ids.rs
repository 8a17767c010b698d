// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Editbridge-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Editbridge and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::borrow::Borrow;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A stable identifier used across the editor, protocol and store surfaces.
///
/// Only enforces that the id is a non-empty *path segment* (no `/`), because ids appear inside
/// endpoint paths like `/api/delete-page-edit/<page_id>/<element_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        validate_id_segment(&value)?;
        Ok(Self {
            value,
            _marker: PhantomData,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T> AsRef<str> for Id<T> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl<T> Borrow<str> for Id<T> {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl<T> FromStr for Id<T> {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl<T> TryFrom<String> for Id<T> {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("id must not be empty")]
    Empty,
    #[error("id must not contain '/'")]
    ContainsSlash,
}

fn validate_id_segment(value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    if value.contains('/') {
        return Err(IdError::ContainsSlash);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementIdTag {}
pub type ElementId = Id<ElementIdTag>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageIdTag {}
pub type PageId = Id<PageIdTag>;

pub const DEFAULT_PAGE_ID: &str = "homepage-v1";

const TEMPLATE_PATH_MARKER: &str = "/t/v1/";

impl PageId {
    /// Derives the page id from a preview location path (`/t/v1/<page_id>`).
    ///
    /// Anything else, including an empty trailing segment, maps to [`DEFAULT_PAGE_ID`].
    pub fn from_location_path(path: &str) -> Self {
        let candidate = path
            .split_once(TEMPLATE_PATH_MARKER)
            .map(|(_, rest)| rest)
            .and_then(|rest| rest.split(['/', '?', '#']).next())
            .filter(|segment| !segment.is_empty());

        candidate
            .and_then(|segment| Self::new(segment).ok())
            .unwrap_or_else(Self::default_page)
    }

    pub fn default_page() -> Self {
        Self {
            value: DEFAULT_PAGE_ID.to_owned(),
            _marker: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{ElementId, Id, IdError, PageId};

    #[test]
    fn id_rejects_empty() {
        let result: Result<Id<()>, _> = Id::new("");
        assert_eq!(result, Err(IdError::Empty));
    }

    #[test]
    fn id_rejects_slash() {
        let result: Result<Id<()>, _> = Id::new("a/b");
        assert_eq!(result, Err(IdError::ContainsSlash));
    }

    #[rstest]
    #[case("/t/v1/bakery-42", "bakery-42")]
    #[case("/t/v1/bakery-42/", "bakery-42")]
    #[case("/t/v1/bakery-42?preview=1", "bakery-42")]
    #[case("/t/v1/", "homepage-v1")]
    #[case("/dashboard", "homepage-v1")]
    #[case("", "homepage-v1")]
    fn page_id_from_location_path(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(PageId::from_location_path(path).as_str(), expected);
    }

    #[test]
    fn ids_round_trip_through_json_as_plain_strings() {
        let id = ElementId::new("p-hero-0").expect("element id");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"p-hero-0\"");

        let err = serde_json::from_str::<ElementId>("\"a/b\"").unwrap_err();
        assert!(err.to_string().contains("'/'"));
    }
}
