//! Parser for the INI dialect used by the catalog documents.
//!
//! The dialect differs from common INI libraries in a few ways:
//!
//! - `;`, `#` and `//` start comment lines
//! - every value is a list split on `,` (a single value is a one-element list)
//! - repeated keys within a section overwrite each other (last write wins)
//! - a repeated section header continues the earlier section
//!
//! Keys appearing before the first section header belong to the unnamed
//! section `""`.

use std::collections::HashMap;

use thiserror::Error;

/// Errors produced while parsing a manifest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestParseError {
    /// A `[` line has no closing `]`.
    #[error("line {line}: unterminated section header")]
    UnterminatedSection { line: usize },

    /// A non-comment line is neither a header nor a `key=value` pair.
    #[error("line {line}: expected 'key=value', found '{content}'")]
    MissingSeparator { line: usize, content: String },

    /// A `key=value` pair has an empty key.
    #[error("line {line}: empty key")]
    EmptyKey { line: usize },
}

/// One `[section]` of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSection {
    values: HashMap<String, Vec<String>>,
}

impl ManifestSection {
    /// Raw list value of `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    /// Value of `key` as a single string, list elements re-joined with `,`.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|parts| parts.join(",").trim().to_string())
    }

    /// Non-empty, trimmed list elements of `key`.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|parts| {
                parts
                    .iter()
                    .map(|p| p.trim())
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `key` holds exactly `1`.
    pub fn get_flag(&self, key: &str) -> bool {
        self.get_string(key).is_some_and(|v| v == "1")
    }

    /// Whether the section has no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn set(&mut self, key: &str, value: &str) {
        let parts = value.split(',').map(str::to_string).collect();
        self.values.insert(key.to_string(), parts);
    }
}

/// A parsed manifest; sections keep document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    order: Vec<String>,
    sections: HashMap<String, ManifestSection>,
}

impl Manifest {
    /// Parse manifest text.
    pub fn parse(text: &str) -> Result<Self, ManifestParseError> {
        let mut manifest = Self::default();
        let mut current = String::new();

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();

            if line.is_empty() || is_comment(line) {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or(ManifestParseError::UnterminatedSection { line: line_no })?;
                current = name.trim().to_string();
                manifest.section_mut(&current);
                continue;
            }

            let (key, value) =
                line.split_once('=')
                    .ok_or_else(|| ManifestParseError::MissingSeparator {
                        line: line_no,
                        content: line.to_string(),
                    })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ManifestParseError::EmptyKey { line: line_no });
            }
            manifest.section_mut(&current).set(key, value.trim());
        }

        Ok(manifest)
    }

    /// Section with exactly this name.
    pub fn section(&self, name: &str) -> Option<&ManifestSection> {
        self.sections.get(name)
    }

    /// Named sections in document order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &ManifestSection)> {
        self.order
            .iter()
            .filter(|name| !name.is_empty())
            .filter_map(|name| self.sections.get(name).map(|s| (name.as_str(), s)))
    }

    fn section_mut(&mut self, name: &str) -> &mut ManifestSection {
        if !self.sections.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.sections.entry(name.to_string()).or_default()
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with(';') || line.starts_with('#') || line.starts_with("//")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = r#"
; effect packages
# generated
// do not edit

[00]
PackageName=Standard effects
PackageDescription=Fast, small, stable
Required=1
EffectFiles=a.fx,b.fx, c.fx
Enabled=0
Enabled=1

[01]
PackageName=Extras
DownloadUrl=
"#;

    #[test]
    fn test_parse_sections_in_order() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let names: Vec<&str> = manifest.sections().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["00", "01"]);
    }

    #[test]
    fn test_values_are_lists() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let section = manifest.section("00").unwrap();
        assert_eq!(section.get("Required"), Some(&["1".to_string()][..]));
        assert_eq!(section.get_list("EffectFiles"), vec!["a.fx", "b.fx", "c.fx"]);
        assert_eq!(
            section.get_string("PackageDescription").as_deref(),
            Some("Fast, small, stable")
        );
    }

    #[test]
    fn test_last_write_wins() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        assert!(manifest.section("00").unwrap().get_flag("Enabled"));
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let section = manifest.section("00").unwrap();
        assert!(section.get("packagename").is_none());
        assert!(manifest.section("00 ").is_none());
    }

    #[test]
    fn test_empty_value_is_one_empty_element() {
        let manifest = Manifest::parse(SAMPLE).unwrap();
        let section = manifest.section("01").unwrap();
        assert_eq!(section.get("DownloadUrl"), Some(&[String::new()][..]));
        assert!(section.get_list("DownloadUrl").is_empty());
    }

    #[test]
    fn test_value_split_on_first_equals() {
        let manifest = Manifest::parse("[a]\nUrl=https://x.test/?a=b\n").unwrap();
        assert_eq!(
            manifest.section("a").unwrap().get_string("Url").as_deref(),
            Some("https://x.test/?a=b")
        );
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        assert_eq!(
            Manifest::parse("[ok]\n[broken\n"),
            Err(ManifestParseError::UnterminatedSection { line: 2 })
        );
        assert!(matches!(
            Manifest::parse("[ok]\njunk\n"),
            Err(ManifestParseError::MissingSeparator { line: 2, .. })
        ));
        assert_eq!(
            Manifest::parse("=value"),
            Err(ManifestParseError::EmptyKey { line: 1 })
        );
    }

    proptest! {
        #[test]
        fn prop_list_round_trips_through_join(items in prop::collection::vec("[a-zA-Z0-9_.]{1,12}", 1..8)) {
            let text = format!("[s]\nEffectFiles={}\n", items.join(","));
            let manifest = Manifest::parse(&text).unwrap();
            prop_assert_eq!(manifest.section("s").unwrap().get_list("EffectFiles"), items);
        }
    }
}
