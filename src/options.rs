//! `NAME=VALUE` option lists.
//!
//! All variable parameters of engine operations travel as ordered lists of
//! `NAME=VALUE` strings. Lookups are case-insensitive on the name and the
//! last occurrence wins. Entries destined for array creation during a deep
//! copy carry an `ARRAY:` prefix and may be further scoped with
//! `IF(DIM=n):` or `IF(NAME=x):` conditions, e.g.
//! `ARRAY:IF(DIM=2):BLOCKSIZE=256,256`.

/// An ordered list of `NAME=VALUE` option strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OptionList(Vec<String>);

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

impl OptionList {
    /// Create an empty option list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an option list from raw `NAME=VALUE` strings.
    #[must_use]
    pub fn from_slice(entries: &[&str]) -> Self {
        Self(entries.iter().map(|s| (*s).to_string()).collect())
    }

    /// Append a raw entry.
    pub fn push(&mut self, entry: impl Into<String>) {
        self.0.push(entry.into());
    }

    /// Append a `NAME=VALUE` entry from its parts.
    pub fn set(&mut self, name: &str, value: &str) {
        self.0.push(format!("{name}={value}"));
    }

    /// The raw entries.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.0
    }

    /// Whether the list holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fetch the value of `name`. The name comparison is case-insensitive and
    /// the last matching entry wins.
    #[must_use]
    pub fn fetch(&self, name: &str) -> Option<&str> {
        self.0.iter().rev().find_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            key.eq_ignore_ascii_case(name).then_some(value)
        })
    }

    /// Fetch the value of `name`, falling back to `default`.
    #[must_use]
    pub fn fetch_default<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.fetch(name).unwrap_or(default)
    }

    /// Fetch `name` as a boolean. `YES`, `TRUE`, `ON` and `1` are true.
    #[must_use]
    pub fn fetch_bool(&self, name: &str, default: bool) -> bool {
        self.fetch(name).map_or(default, |value| {
            ["YES", "TRUE", "ON", "1"]
                .iter()
                .any(|t| value.eq_ignore_ascii_case(t))
        })
    }

    /// Extract the options applying to the creation of one array during a
    /// deep copy: entries with an `ARRAY:` prefix whose `IF(DIM=n):` and
    /// `IF(NAME=x):` conditions, if any, match `array_name`/`dim_count`.
    /// The returned entries have prefix and conditions stripped.
    #[must_use]
    pub fn array_scoped(&self, array_name: &str, dim_count: usize) -> OptionList {
        let mut out = OptionList::new();
        'entry: for entry in &self.0 {
            if !starts_with_ignore_case(entry, "ARRAY:") {
                continue;
            }
            let mut rest = &entry["ARRAY:".len()..];
            loop {
                if starts_with_ignore_case(rest, "IF(DIM=") {
                    let Some((cond, tail)) = rest[7..].split_once("):") else {
                        continue 'entry;
                    };
                    if cond.parse::<usize>() != Ok(dim_count) {
                        continue 'entry;
                    }
                    rest = tail;
                } else if starts_with_ignore_case(rest, "IF(NAME=") {
                    let Some((cond, tail)) = rest[8..].split_once("):") else {
                        continue 'entry;
                    };
                    if !cond.eq_ignore_ascii_case(array_name) {
                        continue 'entry;
                    }
                    rest = tail;
                } else {
                    break;
                }
            }
            out.push(rest);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_list_fetch() {
        let options = OptionList::from_slice(&["A=1", "b=2", "A=3", "novalue"]);
        assert_eq!(options.fetch("a"), Some("3"));
        assert_eq!(options.fetch("B"), Some("2"));
        assert_eq!(options.fetch("c"), None);
        assert_eq!(options.fetch_default("c", "x"), "x");
        assert!(OptionList::from_slice(&["F=YES"]).fetch_bool("f", false));
        assert!(!OptionList::from_slice(&["F=NO"]).fetch_bool("f", true));
    }

    #[test]
    fn option_list_array_scoped() {
        let options = OptionList::from_slice(&[
            "AUTOSCALE=YES",
            "ARRAY:COMPRESS=NONE",
            "ARRAY:IF(DIM=2):BLOCKSIZE=256,256",
            "ARRAY:IF(DIM=3):BLOCKSIZE=1,256,256",
            "ARRAY:IF(NAME=temperature):UNIT=K",
            "ARRAY:IF(DIM=2):IF(NAME=other):SKIPPED=1",
        ]);
        let scoped = options.array_scoped("temperature", 2);
        assert_eq!(
            scoped.entries(),
            &["COMPRESS=NONE", "BLOCKSIZE=256,256", "UNIT=K"]
        );
        assert_eq!(scoped.fetch("blocksize"), Some("256,256"));
        assert!(options.array_scoped("other", 1).fetch("BLOCKSIZE").is_none());
    }
}
