use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a snapshot.
///
/// Plain names and structured categories index under their name; symbols are
/// kept in a separate key space so `Symbol("x")` never matches `Name("x")`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Category {
    Name(String),
    Symbol { symbol: String },
    Structured {
        name: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: BTreeMap<String, String>,
    },
}

impl Category {
    pub fn symbol(symbol: impl Into<String>) -> Self {
        Category::Symbol {
            symbol: symbol.into(),
        }
    }

    pub fn structured(name: impl Into<String>) -> Self {
        Category::Structured {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute; no-op on non-structured categories.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Category::Structured { attributes, .. } = &mut self {
            attributes.insert(key.into(), value.into());
        }
        self
    }

    /// Key used by the category index.
    pub fn index_key(&self) -> CategoryKey {
        match self {
            Category::Name(name) | Category::Structured { name, .. } => {
                CategoryKey::Name(name.clone())
            }
            Category::Symbol { symbol } => CategoryKey::Symbol(symbol.clone()),
        }
    }
}

/// Index bucket of a category. Names and symbols never share a bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CategoryKey {
    Name(String),
    Symbol(String),
}

impl Default for Category {
    fn default() -> Self {
        Category::Name("default".to_string())
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Category::Name(name.to_string())
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Category::Name(name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Name(name) | Category::Structured { name, .. } => write!(f, "{}", name),
            Category::Symbol { symbol } => write!(f, "Symbol({})", symbol),
        }
    }
}
