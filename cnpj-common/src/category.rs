//! Business categories and run counters

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Business category assigned to every processed identifier
///
/// The four tags are mutually exclusive and serialize exactly as their
/// variant names (`Developer`, `NonDeveloper`, `AlreadyQueried`, `NotFound`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// At least one activity mentions software development
    Developer,
    /// Company found, no development activity
    NonDeveloper,
    /// Identifier was already queried in a previous run
    AlreadyQueried,
    /// Lookup failed, returned nothing, or the record had no contact data
    NotFound,
}

impl Category {
    /// All categories, in counter display order
    pub const ALL: [Category; 4] = [
        Category::Developer,
        Category::NonDeveloper,
        Category::AlreadyQueried,
        Category::NotFound,
    ];

    /// Report tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Developer => "Developer",
            Category::NonDeveloper => "NonDeveloper",
            Category::AlreadyQueried => "AlreadyQueried",
            Category::NotFound => "NotFound",
        }
    }

    /// Sort priority in the final report (lower comes first)
    pub fn report_priority(&self) -> u8 {
        match self {
            Category::NonDeveloper => 1,
            Category::AlreadyQueried => 2,
            Category::Developer => 3,
            Category::NotFound => 4,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Developer" => Ok(Category::Developer),
            "NonDeveloper" => Ok(Category::NonDeveloper),
            "AlreadyQueried" => Ok(Category::AlreadyQueried),
            "NotFound" => Ok(Category::NotFound),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown category tag: {}",
                other
            ))),
        }
    }
}

/// Per-category counters for a single run
///
/// Every category starts at zero. Counts only ever go up, one increment per
/// processed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunCounters {
    counts: BTreeMap<Category, u64>,
}

impl RunCounters {
    pub fn new() -> Self {
        Self {
            counts: Category::ALL.iter().map(|c| (*c, 0)).collect(),
        }
    }

    pub fn increment(&mut self, category: Category) {
        *self.counts.entry(category).or_insert(0) += 1;
    }

    pub fn get(&self, category: Category) -> u64 {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    /// Sum over all categories
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, u64)> + '_ {
        self.counts.iter().map(|(c, n)| (*c, *n))
    }

    /// One-line summary, e.g. `Developer=1 NonDeveloper=0 AlreadyQueried=2 NotFound=0`
    pub fn display_string(&self) -> String {
        self.iter()
            .map(|(c, n)| format!("{}={}", c, n))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for RunCounters {
    fn default() -> Self {
        Self::new()
    }
}
