use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::{
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};
use thiserror::Error;

/// Match a string either exactly, with a glob or with a regular expression.
///
/// A string that starts with `^` and ends with `$` is a regular expression, a string that
/// contains a `*` is a glob and anything else is matched exactly.
#[derive(Debug, Clone, SerializeDisplay, DeserializeFromStr)]
pub enum StringMatcher {
    /// Match the string exactly
    Exact(String),
    /// Match the string by glob, `py3*`
    Glob(glob::Pattern),
    /// Match the string by regex, `^py3[0-9]+$`
    Regex(regex::Regex),
}

impl StringMatcher {
    /// Returns true if the matcher matches the string.
    pub fn matches(&self, other: &str) -> bool {
        match self {
            StringMatcher::Exact(s) => s == other,
            StringMatcher::Glob(glob) => glob.matches(other),
            StringMatcher::Regex(regex) => regex.is_match(other),
        }
    }

    /// The source representation of the matcher.
    pub fn as_str(&self) -> &str {
        match self {
            StringMatcher::Exact(s) => s,
            StringMatcher::Glob(glob) => glob.as_str(),
            StringMatcher::Regex(regex) => regex.as_str(),
        }
    }

    /// Returns true if this matcher matches only a single string.
    pub fn is_exact(&self) -> bool {
        matches!(self, StringMatcher::Exact(_))
    }
}

impl PartialEq for StringMatcher {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
            && self.as_str() == other.as_str()
    }
}

impl Eq for StringMatcher {}

impl Hash for StringMatcher {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        self.as_str().hash(state);
    }
}

/// An error that occurred while parsing a [`StringMatcher`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StringMatcherParseError {
    /// The glob could not be parsed
    #[error("invalid glob '{glob}': {message}")]
    InvalidGlob {
        /// The glob
        glob: String,
        /// The error message
        message: String,
    },

    /// The regular expression could not be parsed
    #[error("invalid regex '{regex}': {message}")]
    InvalidRegex {
        /// The regular expression
        regex: String,
        /// The error message
        message: String,
    },
}

impl FromStr for StringMatcher {
    type Err = StringMatcherParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('^') && s.ends_with('$') {
            regex::Regex::new(s)
                .map(StringMatcher::Regex)
                .map_err(|e| StringMatcherParseError::InvalidRegex {
                    regex: s.to_owned(),
                    message: e.to_string(),
                })
        } else if s.contains('*') {
            glob::Pattern::new(s)
                .map(StringMatcher::Glob)
                .map_err(|e| StringMatcherParseError::InvalidGlob {
                    glob: s.to_owned(),
                    message: e.to_string(),
                })
        } else {
            Ok(StringMatcher::Exact(s.to_owned()))
        }
    }
}

impl Display for StringMatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::StringMatcher;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case("py37_0", "py37_0", true)]
    #[case("py37_0", "py37_1", false)]
    #[case("py37*", "py37_1", true)]
    #[case("*_cpython", "h12345_0_cpython", true)]
    #[case("*_cpython", "h12345_0_pypy", false)]
    #[case("^py3[0-9]+_0$", "py310_0", true)]
    #[case("^py3[0-9]+_0$", "py3_0", false)]
    fn test_matches(#[case] matcher: &str, #[case] input: &str, #[case] expected: bool) {
        let matcher = StringMatcher::from_str(matcher).unwrap();
        assert_eq!(matcher.matches(input), expected);
    }

    #[test]
    fn test_equality_by_source() {
        assert_eq!(
            StringMatcher::from_str("py*").unwrap(),
            StringMatcher::from_str("py*").unwrap()
        );
        assert_ne!(
            StringMatcher::from_str("py*").unwrap(),
            StringMatcher::from_str("py").unwrap()
        );
        assert!(StringMatcher::from_str("^(unclosed$").is_err());
    }
}
