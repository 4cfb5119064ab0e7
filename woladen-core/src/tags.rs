//! Ordered OpenStreetMap tag maps.

use std::collections::BTreeMap;

/// OpenStreetMap-style key/value tags attached to a geometry.
///
/// Keys are kept in sorted order so iteration and serialisation are
/// deterministic. Lookups for absent keys return `None`.
///
/// # Examples
/// ```
/// use woladen_core::Tags;
///
/// let tags = Tags::from_pairs([("amenity", "cafe"), ("name", "Café X")]);
/// assert_eq!(tags.get("amenity"), Some("cafe"));
/// assert_eq!(tags.get("shop"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Create an empty tag map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect borrowed key/value pairs into an owned tag map.
    ///
    /// Later duplicates of a key overwrite earlier ones.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        pairs
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect()
    }

    /// Return the value stored for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert or replace a tag, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Number of tags held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map holds no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over tags as borrowed pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Return a trimmed, non-empty value for `key`.
    ///
    /// Whitespace-only values are treated as missing, which is how names and
    /// opening hours are read for presentation.
    #[must_use]
    pub fn non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|value| !value.is_empty())
    }
}

impl FromIterator<(String, String)> for Tags {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn missing_keys_return_none() {
        let tags = Tags::from_pairs([("amenity", "cafe")]);
        assert_eq!(tags.get("amenity"), Some("cafe"));
        assert_eq!(tags.get("name"), None);
    }

    #[rstest]
    #[case("", None)]
    #[case("   ", None)]
    #[case(" Café X ", Some("Café X"))]
    fn non_blank_trims_values(#[case] raw: &str, #[case] expected: Option<&str>) {
        let tags = Tags::from_pairs([("name", raw)]);
        assert_eq!(tags.non_blank("name"), expected);
    }

    #[rstest]
    fn iteration_is_key_ordered() {
        let tags = Tags::from_pairs([("shop", "bakery"), ("amenity", "cafe")]);
        let keys: Vec<&str> = tags.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["amenity", "shop"]);
    }
}
