//! Composite entity keys
//!
//! Every graph entity is addressed by a composite key of the wire form
//! `<kind>_<id>` (`user_42`, `ip_10.0.0.9`). Internally the key is a typed
//! pair so the kind namespace stays disjoint; the string form is only used at
//! the edges of the system.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The kind of entity a graph node represents.
///
/// `Unknown` is the placeholder kind for nodes created implicitly as edge
/// endpoints; it upgrades to a concrete kind on the first explicit upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    User,
    Device,
    Ip,
    Merchant,
    Card,
    Unknown,
}

impl NodeKind {
    /// The lowercase wire prefix for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::User => "user",
            NodeKind::Device => "device",
            NodeKind::Ip => "ip",
            NodeKind::Merchant => "merchant",
            NodeKind::Card => "card",
            NodeKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(NodeKind::User),
            "device" => Ok(NodeKind::Device),
            "ip" => Ok(NodeKind::Ip),
            "merchant" => Ok(NodeKind::Merchant),
            "card" => Ok(NodeKind::Card),
            "unknown" => Ok(NodeKind::Unknown),
            other => Err(KeyParseError::UnknownKind(other.to_string())),
        }
    }
}

/// Errors produced when parsing a composite key from its wire form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("composite key '{0}' is missing the '<kind>_<id>' separator")]
    MissingSeparator(String),

    #[error("composite key has unrecognized kind prefix '{0}'")]
    UnknownKind(String),

    #[error("composite key has an empty id segment")]
    EmptyId,
}

/// A typed composite key identifying one graph entity.
///
/// Serializes as the wire string `<kind>_<id>` for external compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    kind: NodeKind,
    id: String,
}

impl EntityKey {
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(NodeKind::User, id)
    }

    pub fn device(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Device, id)
    }

    pub fn ip(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Ip, id)
    }

    pub fn merchant(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Merchant, id)
    }

    pub fn card(id: impl Into<String>) -> Self {
        Self::new(NodeKind::Card, id)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.id)
    }
}

impl FromStr for EntityKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s
            .split_once('_')
            .ok_or_else(|| KeyParseError::MissingSeparator(s.to_string()))?;
        if id.is_empty() {
            return Err(KeyParseError::EmptyId);
        }
        let kind = NodeKind::from_str(prefix)?;
        Ok(Self::new(kind, id))
    }
}

impl Serialize for EntityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form_round_trip() {
        let key = EntityKey::user("alice");
        assert_eq!(key.to_string(), "user_alice");
        assert_eq!("user_alice".parse::<EntityKey>().unwrap(), key);
    }

    #[test]
    fn test_id_may_contain_separators() {
        let key: EntityKey = "ip_10.0.0.9".parse().unwrap();
        assert_eq!(key.kind(), NodeKind::Ip);
        assert_eq!(key.id(), "10.0.0.9");

        // Only the first underscore splits kind from id.
        let key: EntityKey = "device_mac_book_pro".parse().unwrap();
        assert_eq!(key.id(), "mac_book_pro");
    }

    #[test]
    fn test_kind_namespaces_are_disjoint() {
        let user = EntityKey::user("1");
        let device = EntityKey::device("1");
        assert_ne!(user, device);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "nounderscore".parse::<EntityKey>(),
            Err(KeyParseError::MissingSeparator(_))
        ));
        assert!(matches!(
            "widget_1".parse::<EntityKey>(),
            Err(KeyParseError::UnknownKind(_))
        ));
        assert!(matches!("user_".parse::<EntityKey>(), Err(KeyParseError::EmptyId)));
    }

    #[test]
    fn test_serializes_as_wire_string() {
        let key = EntityKey::merchant("acme");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"merchant_acme\"");
        let parsed: EntityKey = serde_json::from_str("\"merchant_acme\"").unwrap();
        assert_eq!(parsed, key);
    }
}
