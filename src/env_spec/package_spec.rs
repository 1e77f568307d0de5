//! Parsing of package specifications such as `numpy>=1.20,<2` or `conda-forge::scipy=1.11`.

use regex::Regex;
use std::sync::OnceLock;

/// A parsed package specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Package name (lower-cased as written)
    pub name: String,
    /// Optional channel prefix (`channel::name`)
    pub channel: Option<String>,
    /// Everything after the name, trimmed; empty when unconstrained
    pub constraint: String,
}

fn spec_regex() -> Option<&'static Regex> {
    static SPEC: OnceLock<Option<Regex>> = OnceLock::new();
    SPEC.get_or_init(|| {
        Regex::new(
            r"^(?:(?P<channel>[A-Za-z0-9_.\-/:]+?)::)?(?P<name>[A-Za-z0-9_][A-Za-z0-9_.\-]*)(?P<rest>.*)$",
        )
        .ok()
    })
    .as_ref()
}

fn constraint_regex() -> Option<&'static Regex> {
    static CONSTRAINT: OnceLock<Option<Regex>> = OnceLock::new();
    CONSTRAINT.get_or_init(|| {
        // `=1.2`, `>=1,<2`, `==1.0=py_0`, or conda's `1.2 build` form
        Regex::new(
            r"^(?:(?:[=<>!~]=?|==)\s*[A-Za-z0-9_.*+!]+(?:\s*[,|]\s*(?:[=<>!~]=?)?\s*[A-Za-z0-9_.*+!]+)*(?:=[A-Za-z0-9_.*+]+)?|\s+[0-9*][A-Za-z0-9_.*+!]*(?:\s+[A-Za-z0-9_.*+]+)?)$",
        )
        .ok()
    })
    .as_ref()
}

/// Parse a package specification, returning `None` when it is malformed.
pub fn parse_spec(spec: &str) -> Option<PackageSpec> {
    let spec = spec.trim();
    let captures = spec_regex()?.captures(spec)?;
    let name = captures.name("name")?.as_str().to_string();
    let rest = captures.name("rest").map_or("", |m| m.as_str());

    if !rest.trim().is_empty() && !constraint_regex()?.is_match(rest) {
        return None;
    }

    Some(PackageSpec {
        name,
        channel: captures.name("channel").map(|m| m.as_str().to_string()),
        constraint: rest.trim().to_string(),
    })
}

/// Name of a pinned record (`numpy=1.26.0=py311_0` -> `numpy`).
pub fn record_name(record: &str) -> &str {
    let without_channel = record.rsplit_once("::").map_or(record, |(_, rest)| rest);
    without_channel
        .split(|c: char| c == '=' || c.is_whitespace())
        .next()
        .unwrap_or(without_channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_name() {
        let spec = parse_spec("numpy").unwrap();
        assert_eq!(spec.name, "numpy");
        assert_eq!(spec.constraint, "");
        assert_eq!(spec.channel, None);
    }

    #[test]
    fn test_parse_constraints() {
        assert_eq!(parse_spec("numpy=1.26").unwrap().constraint, "=1.26");
        assert_eq!(parse_spec("numpy>=1.20,<2").unwrap().constraint, ">=1.20,<2");
        assert_eq!(parse_spec("python==3.11.4=h955ad1f_0").unwrap().name, "python");
        assert_eq!(parse_spec("bokeh 3.3.0 py311_0").unwrap().constraint, "3.3.0 py311_0");
    }

    #[test]
    fn test_parse_channel_prefix() {
        let spec = parse_spec("conda-forge::scipy=1.11").unwrap();
        assert_eq!(spec.channel.as_deref(), Some("conda-forge"));
        assert_eq!(spec.name, "scipy");
    }

    #[test]
    fn test_bad_specs() {
        assert!(parse_spec("").is_none());
        assert!(parse_spec("=").is_none());
        assert!(parse_spec("%%").is_none());
        assert!(parse_spec("numpy$$").is_none());
        assert!(parse_spec("numpy=").is_none());
    }

    #[test]
    fn test_record_name() {
        assert_eq!(record_name("numpy=1.26.0=py311_0"), "numpy");
        assert_eq!(record_name("conda-forge::scipy=1.11.0=0"), "scipy");
        assert_eq!(record_name("bokeh 3.3.0 py311_0"), "bokeh");
    }
}
