//! Entity ids of the form `domain.object_id`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity_id must contain exactly one '.' separator")]
    InvalidFormat,

    #[error("domain cannot be empty")]
    EmptyDomain,

    #[error("object_id cannot be empty")]
    EmptyObjectId,

    #[error("'{0}' is not lowercase alphanumeric with single inner underscores")]
    InvalidChars(String),
}

/// Entity id such as `binary_sensor.wisafe2_a1b2_smoke`
///
/// Both parts are lowercase ASCII alphanumerics joined by underscores, and
/// neither part starts or ends with an underscore.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    pub fn new(
        domain: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Result<Self, EntityIdError> {
        let domain = domain.into();
        let object_id = object_id.into();

        if domain.is_empty() {
            return Err(EntityIdError::EmptyDomain);
        }
        if object_id.is_empty() {
            return Err(EntityIdError::EmptyObjectId);
        }
        if !is_valid_part(&domain) || domain.contains("__") {
            return Err(EntityIdError::InvalidChars(domain));
        }
        if !is_valid_part(&object_id) {
            return Err(EntityIdError::InvalidChars(object_id));
        }

        Ok(Self { domain, object_id })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

fn is_valid_part(s: &str) -> bool {
    !s.starts_with('_')
        && !s.ends_with('_')
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Turn arbitrary text (device ids, names) into a valid object id
///
/// Runs of anything other than ASCII alphanumerics collapse to one
/// underscore. Text with nothing usable becomes `unknown`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("unknown");
    }
    slug
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((domain, object_id)) if !object_id.contains('.') => Self::new(domain, object_id),
            _ => Err(EntityIdError::InvalidFormat),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entity_id() {
        let id: EntityId = "binary_sensor.wisafe2_d1_smoke".parse().unwrap();
        assert_eq!(id.domain(), "binary_sensor");
        assert_eq!(id.object_id(), "wisafe2_d1_smoke");
        assert_eq!(id.to_string(), "binary_sensor.wisafe2_d1_smoke");
    }

    #[test]
    fn test_invalid_format() {
        assert_eq!(
            "no_separator".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
        assert_eq!(
            "too.many.parts".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
        assert_eq!(
            ".object".parse::<EntityId>().unwrap_err(),
            EntityIdError::EmptyDomain
        );
    }

    #[test]
    fn test_invalid_chars() {
        assert!(matches!(
            "sensor.Upper".parse::<EntityId>(),
            Err(EntityIdError::InvalidChars(_))
        ));
        assert!(matches!(
            "sensor._lead".parse::<EntityId>(),
            Err(EntityIdError::InvalidChars(_))
        ));
        assert!(matches!(
            "bad__domain.x".parse::<EntityId>(),
            Err(EntityIdError::InvalidChars(_))
        ));
    }

    #[test]
    fn test_slugify_device_ids() {
        assert_eq!(slugify("D1"), "d1");
        assert_eq!(slugify("A1:B2-C3"), "a1_b2_c3");
        assert_eq!(slugify("  Kitchen  Smoke!"), "kitchen_smoke");
        assert_eq!(slugify("--"), "unknown");
    }

    #[test]
    fn test_slug_is_valid_object_id() {
        for raw in ["0x7F12", "Hall / Upstairs", "__x__"] {
            assert!(EntityId::new("sensor", slugify(raw)).is_ok(), "{raw}");
        }
    }

    #[test]
    fn test_serde_as_string() {
        let id = EntityId::new("button", "wisafe2_test_co").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"button.wisafe2_test_co\"");
        assert_eq!(serde_json::from_str::<EntityId>(&json).unwrap(), id);
    }
}
