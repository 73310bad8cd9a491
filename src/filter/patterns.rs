//! Compiled domain patterns.

use clap::ValueEnum;
use regex::{Regex, RegexBuilder};

use crate::error::ConfigError;

/// Where a pattern is allowed to start matching within a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MatchMode {
    /// The match must begin at the first character of the name. Anything
    /// after the matched text is ignored, so `eu\d*\.game\.com` matches
    /// `eu1.game.com.cdn.net` but not `www.eu1.game.com`.
    #[default]
    Prefix,
    /// The match may begin anywhere in the name.
    Search,
}

/// An ordered set of case-insensitive domain patterns.
#[derive(Debug, Clone)]
pub struct Patterns {
    compiled: Vec<(String, Regex)>,
    mode: MatchMode,
}

impl Patterns {
    /// Compile every pattern, failing on the first invalid one.
    pub fn new<I, S>(patterns: I, mode: MatchMode) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                let source = match mode {
                    MatchMode::Prefix => format!("^(?:{pattern})"),
                    MatchMode::Search => pattern.to_string(),
                };
                RegexBuilder::new(&source)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (pattern.to_string(), re))
                    .map_err(|e| ConfigError::InvalidPattern {
                        pattern: pattern.to_string(),
                        source: Box::new(e),
                    })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { compiled, mode })
    }

    /// Source text of the first pattern matching `name`.
    pub fn first_match(&self, name: &str) -> Option<&str> {
        self.compiled
            .iter()
            .find(|(_, re)| re.is_match(name))
            .map(|(pattern, _)| pattern.as_str())
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.first_match(name).is_some()
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(patterns: &[&str]) -> Patterns {
        Patterns::new(patterns, MatchMode::Prefix).unwrap()
    }

    #[test]
    fn is_match_prefix() {
        let patterns = prefix(&["eu\\d*\\.game\\.com"]);

        assert!(patterns.is_match("eu1.game.com"));
        assert!(patterns.is_match("eu.game.com"));
    }

    #[test]
    fn is_match_ignores_trailing_content() {
        let patterns = prefix(&["eu\\d*\\.game\\.com"]);

        assert!(patterns.is_match("eu12.game.com.edgesuite.net"));
    }

    #[test]
    fn is_match_prefix_requires_start_of_name() {
        let patterns = prefix(&["eu\\d*\\.game\\.com", "twitch\\.tv$"]);

        assert!(!patterns.is_match("www.eu1.game.com"));
        assert!(!patterns.is_match("cdn.twitch.tv"));
        assert!(patterns.is_match("twitch.tv"));
    }

    #[test]
    fn is_match_search_anywhere() {
        let patterns = Patterns::new(["twitch\\.tv$"], MatchMode::Search).unwrap();

        assert!(patterns.is_match("cdn.twitch.tv"));
        assert!(!patterns.is_match("twitch.tv.example.com"));
    }

    #[test]
    fn is_match_case_insensitive() {
        let patterns = prefix(&["EU\\d+\\.Game\\.com"]);

        assert!(patterns.is_match("eu1.game.com"));
        assert!(patterns.is_match("EU1.GAME.COM"));
    }

    #[test]
    fn first_match_returns_first_in_order() {
        let patterns = prefix(&["nope\\.", "eu", "eu1"]);

        assert_eq!(patterns.first_match("eu1.game.com"), Some("eu"));
        assert_eq!(patterns.first_match("us1.game.com"), None);
    }

    #[test]
    fn alternation_stays_anchored() {
        let patterns = prefix(&["a\\.com|b\\.com"]);

        assert!(patterns.is_match("b.com"));
        assert!(!patterns.is_match("xb.com"));
    }

    #[test]
    fn new_rejects_invalid_pattern() {
        let err = Patterns::new(["ok", "(unclosed"], MatchMode::Prefix).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::InvalidPattern { ref pattern, .. } if pattern == "(unclosed"
        ));
    }

    #[test]
    fn empty_set_matches_nothing() {
        let patterns = Patterns::new(Vec::<String>::new(), MatchMode::Prefix).unwrap();

        assert!(patterns.is_empty());
        assert!(!patterns.is_match("example.com"));
    }
}
