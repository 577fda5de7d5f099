use std::fmt;

use strum::{Display, EnumIter, EnumString};

use super::*;

#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum TagNamespace {
    Area,
    Role,
    Technology,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub namespace: TagNamespace,
    pub name: String,
}

impl Tag {
    pub fn new(namespace: TagNamespace, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TagRule {
    pub namespace: TagNamespace,
    pub name: String,
    pub patterns: Vec<String>,
    pub weight: f64,
    #[serde(default)]
    pub description: String,
}

impl TagRule {
    pub fn new(namespace: TagNamespace, name: &str, patterns: &[&str], weight: f64) -> Self {
        Self {
            namespace,
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            weight,
            description: String::new(),
        }
    }

    pub fn tag(&self) -> Tag {
        Tag::new(self.namespace, self.name.clone())
    }
}

/// Position on the bonding curve for a point total.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct TagLevel {
    pub level: u32,
    pub progress: f64,
    pub points: f64,
}
