//! Loading a replacement rule table from JSON.
//!
//! The file is a list of categories in match order:
//!
//! ```json
//! [
//!   {"category": "cafe", "selectors": [{"key": "amenity", "value": "cafe"}]},
//!   {"category": "pharmacy", "selectors": [
//!     {"key": "amenity", "value": "pharmacy"},
//!     {"key": "shop", "value": "chemist"}
//!   ]}
//! ]
//! ```

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;
use woladen_core::{AmenityRule, RuleTable, RuleTableError, TagSelector};

/// Errors raised while loading a rule file.
#[derive(Debug, Error)]
pub enum RulesFileError {
    /// The file could not be read.
    #[error("failed to read amenity rules from {path}")]
    Read {
        /// Rule file location.
        path: Utf8PathBuf,
        /// I/O failure.
        #[source]
        source: io::Error,
    },
    /// The file was not a valid rule list.
    #[error("failed to parse amenity rules in {path}")]
    Parse {
        /// Rule file location.
        path: Utf8PathBuf,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// The rules did not form a valid table.
    #[error("invalid amenity rules in {path}")]
    Invalid {
        /// Rule file location.
        path: Utf8PathBuf,
        /// Validation failure.
        #[source]
        source: RuleTableError,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleRecord {
    category: String,
    selectors: Vec<TagSelector>,
}

/// Read and validate the rule table stored at `path`.
///
/// # Errors
///
/// Returns [`RulesFileError`] when the file is unreadable, malformed, or
/// describes an empty table, a blank or repeated category, or a category
/// without selectors.
pub fn load_rule_table(path: &Utf8Path) -> Result<RuleTable, RulesFileError> {
    let text = woladen_fs::read_utf8(path).map_err(|source| RulesFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rule_table(&text).map_err(|err| match err {
        ParseFailure::Json(source) => RulesFileError::Parse {
            path: path.to_path_buf(),
            source,
        },
        ParseFailure::Rules(source) => RulesFileError::Invalid {
            path: path.to_path_buf(),
            source,
        },
    })
}

#[derive(Debug)]
enum ParseFailure {
    Json(serde_json::Error),
    Rules(RuleTableError),
}

fn parse_rule_table(text: &str) -> Result<RuleTable, ParseFailure> {
    let records: Vec<RuleRecord> = serde_json::from_str(text).map_err(ParseFailure::Json)?;
    let rules = records
        .into_iter()
        .map(|record| AmenityRule::new(record.category, record.selectors))
        .collect::<Result<Vec<_>, _>>()
        .map_err(ParseFailure::Rules)?;
    RuleTable::new(rules).map_err(ParseFailure::Rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn write_rules(contents: &str) -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("rules.json")).expect("utf-8 path");
        std::fs::write(&path, contents).expect("write rules");
        (dir, path)
    }

    #[rstest]
    fn rule_files_replace_the_default_table() {
        let (_dir, path) = write_rules(
            r#"[
                {"category": "charging_cafe", "selectors": [{"key": "amenity", "value": "cafe"}]},
                {"category": "fuel", "selectors": [{"key": "amenity", "value": "fuel"}]}
            ]"#,
        );
        let table = load_rule_table(&path).expect("valid rules");
        let categories: Vec<&str> = table.categories().collect();
        assert_eq!(categories, vec!["charging_cafe", "fuel"]);
    }

    #[rstest]
    #[case("[]", "empty")]
    #[case(r#"[{"category": " ", "selectors": [{"key": "a", "value": "b"}]}]"#, "blank")]
    #[case(r#"[{"category": "x", "selectors": []}]"#, "no selectors")]
    #[case(
        r#"[{"category": "x", "selectors": [{"key": "a", "value": "b"}]},
            {"category": "x", "selectors": [{"key": "c", "value": "d"}]}]"#,
        "duplicate"
    )]
    fn invalid_tables_are_rejected(#[case] contents: &str, #[case] _label: &str) {
        let (_dir, path) = write_rules(contents);
        let err = load_rule_table(&path).expect_err("table is invalid");
        assert!(matches!(err, RulesFileError::Invalid { .. }));
    }

    #[rstest]
    fn malformed_json_is_a_parse_error() {
        let (_dir, path) = write_rules(r#"{"category": "cafe"}"#);
        let err = load_rule_table(&path).expect_err("not a list");
        assert!(matches!(err, RulesFileError::Parse { .. }));
    }

    #[rstest]
    fn missing_files_are_read_errors() {
        let err = load_rule_table(Utf8Path::new("definitely/not/here.json"))
            .expect_err("file is missing");
        assert!(matches!(err, RulesFileError::Read { .. }));
    }
}
