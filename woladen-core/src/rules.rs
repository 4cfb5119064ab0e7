//! Amenity categories and the tag selectors that define them.
//!
//! A [`RuleTable`] is built once per run and passed explicitly into every
//! classification call. A geometry belongs to a category when any of the
//! category's selectors matches one of its tags exactly.

use std::collections::HashSet;

use thiserror::Error;

use crate::Tags;

/// A single `key=value` tag selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TagSelector {
    /// Tag key, e.g. `amenity`.
    pub key: String,
    /// Required tag value, e.g. `cafe`.
    pub value: String,
}

impl TagSelector {
    /// Construct a selector from a key and value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Whether the selector matches the given tag pair.
    #[must_use]
    pub fn matches(&self, key: &str, value: &str) -> bool {
        self.key == key && self.value == value
    }
}

/// One amenity category with its ordered selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AmenityRule {
    category: String,
    selectors: Vec<TagSelector>,
}

impl AmenityRule {
    /// Validates and constructs an [`AmenityRule`].
    ///
    /// # Errors
    ///
    /// Returns [`RuleTableError::BlankCategory`] for an empty category name
    /// and [`RuleTableError::NoSelectors`] when `selectors` is empty.
    pub fn new(
        category: impl Into<String>,
        selectors: Vec<TagSelector>,
    ) -> Result<Self, RuleTableError> {
        let category = category.into();
        if category.trim().is_empty() {
            return Err(RuleTableError::BlankCategory);
        }
        if selectors.is_empty() {
            return Err(RuleTableError::NoSelectors { category });
        }
        Ok(Self {
            category,
            selectors,
        })
    }

    /// Category identifier, e.g. `pharmacy`.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Selectors in declaration order.
    #[must_use]
    pub fn selectors(&self) -> &[TagSelector] {
        &self.selectors
    }

    fn matches_pair(&self, key: &str, value: &str) -> bool {
        self.selectors
            .iter()
            .any(|selector| selector.matches(key, value))
    }
}

/// Errors returned when building a [`RuleTable`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleTableError {
    /// The table contained no rules.
    #[error("rule table must contain at least one category")]
    Empty,
    /// A rule had a blank category name.
    #[error("amenity category names must not be blank")]
    BlankCategory,
    /// A rule had no selectors and could never match.
    #[error("amenity category {category:?} has no tag selectors")]
    NoSelectors {
        /// Offending category.
        category: String,
    },
    /// Two rules shared a category name.
    #[error("amenity category {category:?} is defined more than once")]
    DuplicateCategory {
        /// Repeated category.
        category: String,
    },
}

/// Immutable, ordered set of amenity rules.
///
/// # Examples
/// ```
/// use woladen_core::{RuleTable, Tags};
///
/// let rules = RuleTable::default();
/// let tags = Tags::from_pairs([("shop", "chemist")]);
/// assert_eq!(rules.classify(&tags), vec!["pharmacy"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<AmenityRule>,
}

impl RuleTable {
    /// Validates and constructs a [`RuleTable`].
    ///
    /// # Errors
    ///
    /// Returns [`RuleTableError::Empty`] for an empty list and
    /// [`RuleTableError::DuplicateCategory`] when a category repeats.
    pub fn new(rules: Vec<AmenityRule>) -> Result<Self, RuleTableError> {
        if rules.is_empty() {
            return Err(RuleTableError::Empty);
        }
        let mut seen = HashSet::new();
        for rule in &rules {
            if rule.category.trim().is_empty() {
                return Err(RuleTableError::BlankCategory);
            }
            if rule.selectors.is_empty() {
                return Err(RuleTableError::NoSelectors {
                    category: rule.category.clone(),
                });
            }
            if !seen.insert(rule.category.as_str()) {
                return Err(RuleTableError::DuplicateCategory {
                    category: rule.category.clone(),
                });
            }
        }
        Ok(Self { rules })
    }

    /// Rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[AmenityRule] {
        &self.rules
    }

    /// Category names in declaration order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(AmenityRule::category)
    }

    /// Every selector across all categories, in declaration order.
    pub fn selectors(&self) -> impl Iterator<Item = &TagSelector> {
        self.rules.iter().flat_map(|rule| rule.selectors.iter())
    }

    /// Whether `category` is configured.
    #[must_use]
    pub fn contains(&self, category: &str) -> bool {
        self.rules.iter().any(|rule| rule.category == category)
    }

    /// Categories matched by `tags`, in rule order, each at most once.
    #[must_use]
    pub fn classify(&self, tags: &Tags) -> Vec<&str> {
        self.classify_pairs(tags.iter())
    }

    /// Categories matched by a stream of borrowed tag pairs.
    ///
    /// Allocates nothing for elements that match no rule, so it can be used
    /// directly on decoder tag iterators.
    pub fn classify_pairs<'t, I>(&self, pairs: I) -> Vec<&str>
    where
        I: IntoIterator<Item = (&'t str, &'t str)>,
    {
        let mut matched: Vec<usize> = Vec::new();
        for (key, value) in pairs {
            for (index, rule) in self.rules.iter().enumerate() {
                if rule.matches_pair(key, value) && !matched.contains(&index) {
                    matched.push(index);
                }
            }
        }
        matched.sort_unstable();
        matched
            .into_iter()
            .filter_map(|index| self.rules.get(index).map(AmenityRule::category))
            .collect()
    }
}

impl Default for RuleTable {
    /// The standard charging-stop amenity categories.
    fn default() -> Self {
        let rule = |category: &str, selectors: &[(&str, &str)]| AmenityRule {
            category: category.to_owned(),
            selectors: selectors
                .iter()
                .map(|(key, value)| TagSelector::new(*key, *value))
                .collect(),
        };
        Self {
            rules: vec![
                rule("restaurant", &[("amenity", "restaurant")]),
                rule("cafe", &[("amenity", "cafe")]),
                rule("fast_food", &[("amenity", "fast_food")]),
                rule("toilets", &[("amenity", "toilets")]),
                rule("supermarket", &[("shop", "supermarket")]),
                rule("bakery", &[("shop", "bakery")]),
                rule("convenience", &[("shop", "convenience")]),
                rule("pharmacy", &[("amenity", "pharmacy"), ("shop", "chemist")]),
                rule("hotel", &[("tourism", "hotel")]),
                rule("museum", &[("tourism", "museum")]),
                rule("playground", &[("leisure", "playground")]),
                rule("park", &[("leisure", "park")]),
                rule("ice_cream", &[("amenity", "ice_cream")]),
            ],
        }
    }
}

impl TryFrom<Vec<AmenityRule>> for RuleTable {
    type Error = RuleTableError;

    fn try_from(rules: Vec<AmenityRule>) -> Result<Self, Self::Error> {
        Self::new(rules)
    }
}
