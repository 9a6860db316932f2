//! Meme taxonomy: named categories, optionally mutually exclusive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::normalize;
use crate::error::FabricationError;

fn default_exclusive() -> bool {
    true
}

/// One taxonomy category, e.g. `SEASON[WINTER, SUMMER]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemeCategory {
    pub name: String,
    pub memes: Vec<String>,

    /// When true, at most one meme of this category may be active at once.
    #[serde(default = "default_exclusive")]
    pub exclusive: bool,
}

impl MemeCategory {
    pub fn new(name: &str, memes: &[&str]) -> Self {
        Self {
            name: normalize(name),
            memes: memes.iter().map(|m| normalize(m)).collect(),
            exclusive: true,
        }
    }

    /// Returns true if the category lists `body` (already normalised).
    pub fn contains(&self, body: &str) -> bool {
        self.memes.iter().any(|m| normalize(m) == body)
    }
}

/// The full set of categories known to a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemeTaxonomy {
    categories: Vec<MemeCategory>,
}

impl MemeTaxonomy {
    /// A taxonomy with no categories: every plain meme combination is admissible.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(categories: Vec<MemeCategory>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[MemeCategory] {
        &self.categories
    }

    /// Every exclusive category containing `body`.
    pub fn exclusive_categories_of<'a>(&'a self, body: &'a str) -> impl Iterator<Item = &'a MemeCategory> + 'a {
        self.categories
            .iter()
            .filter(move |c| c.exclusive && c.contains(body))
    }
}

impl FromStr for MemeTaxonomy {
    type Err = FabricationError;

    /// Parses `NAME[A, B, C], OTHER[D, E]`. Every category parsed this way is exclusive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut categories = Vec::new();
        let mut rest = s.trim();
        while !rest.is_empty() {
            let open = rest.find('[').ok_or_else(|| {
                FabricationError::invalid_config(format!("taxonomy category missing '[' in '{}'", rest))
            })?;
            let close = rest.find(']').ok_or_else(|| {
                FabricationError::invalid_config(format!("taxonomy category missing ']' in '{}'", rest))
            })?;
            if close < open {
                return Err(FabricationError::invalid_config(format!(
                    "taxonomy brackets out of order in '{}'",
                    rest
                )));
            }
            let name = normalize(&rest[..open]);
            if name.is_empty() {
                return Err(FabricationError::invalid_config("taxonomy category without name"));
            }
            let memes: Vec<String> = rest[open + 1..close]
                .split(',')
                .map(normalize)
                .filter(|m| !m.is_empty())
                .collect();
            categories.push(MemeCategory {
                name,
                memes,
                exclusive: true,
            });
            rest = rest[close + 1..].trim_start().trim_start_matches(',').trim_start();
        }
        Ok(Self { categories })
    }
}

impl fmt::Display for MemeTaxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .categories
            .iter()
            .map(|c| format!("{}[{}]", c.name, c.memes.join(", ")))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}
