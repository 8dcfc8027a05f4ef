use super::{Component, Segment, Version};
use smallvec::SmallVec;
use std::num::ParseIntError;
use thiserror::Error;

/// An error that occurred during parsing of a string to a version.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("malformed version string '{version}': {kind}")]
pub struct ParseVersionError {
    /// The original string that was the input of the parser
    pub version: String,

    /// The type of parse error that occurred
    pub kind: ParseVersionErrorKind,
}

impl ParseVersionError {
    /// Create a new parse error
    pub fn new(text: impl Into<String>, kind: ParseVersionErrorKind) -> Self {
        Self {
            version: text.into(),
            kind,
        }
    }
}

/// The type of parse error that occurred when parsing a version string.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseVersionErrorKind {
    /// The string was empty
    #[error("empty string")]
    Empty,

    /// The string contained a character that is not allowed in a version
    #[error("invalid character '{0}'")]
    InvalidCharacter(char),

    /// The epoch was not an integer value
    #[error("epoch is not a number")]
    EpochMustBeInteger(#[source] ParseIntError),

    /// More than one epoch separator
    #[error("duplicated epoch separator '!'")]
    DuplicateEpochSeparator,

    /// More than one local version separator
    #[error("duplicated local version separator '+'")]
    DuplicateLocalVersionSeparator,

    /// The local version was empty
    #[error("empty local version")]
    EmptyLocalVersion,

    /// A segment was empty, e.g. a leading, trailing or double separator
    #[error("empty version segment")]
    EmptySegment,

    /// A number did not fit in 64 bits
    #[error("invalid number")]
    InvalidNumeral(#[source] ParseIntError),
}

/// Parses a version string into a [`Version`].
pub(super) fn parse_version(input: &str) -> Result<Version, ParseVersionError> {
    let lowered = input.trim().to_lowercase();
    let err = |kind| ParseVersionError::new(input, kind);

    if lowered.is_empty() {
        return Err(err(ParseVersionErrorKind::Empty));
    }

    if let Some(c) = lowered
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '!' | '+')))
    {
        return Err(err(ParseVersionErrorKind::InvalidCharacter(c)));
    }

    // Split off the epoch
    let (epoch, rest) = match lowered.split_once('!') {
        Some((epoch, rest)) => {
            if rest.contains('!') {
                return Err(err(ParseVersionErrorKind::DuplicateEpochSeparator));
            }
            let epoch = epoch
                .parse::<u64>()
                .map_err(|e| err(ParseVersionErrorKind::EpochMustBeInteger(e)))?;
            (epoch, rest)
        }
        None => (0, lowered.as_str()),
    };

    // Split off the local version
    let (common, local) = match rest.split_once('+') {
        Some((common, local)) => {
            if local.contains('+') {
                return Err(err(ParseVersionErrorKind::DuplicateLocalVersionSeparator));
            }
            if local.is_empty() {
                return Err(err(ParseVersionErrorKind::EmptyLocalVersion));
            }
            (common, Some(local))
        }
        None => (rest, None),
    };

    let segments = parse_segments(common).map_err(err)?;
    let local = match local {
        Some(local) => parse_segments(local).map_err(err)?,
        None => SmallVec::new(),
    };

    Ok(Version {
        epoch,
        segments,
        local,
    })
}

/// Splits a string on segment separators and parses each segment.
fn parse_segments<A: smallvec::Array<Item = Segment>>(
    input: &str,
) -> Result<SmallVec<A>, ParseVersionErrorKind> {
    let mut segments = SmallVec::new();
    let mut separator = None;
    let mut remaining = input;
    loop {
        let end = remaining
            .find(['.', '-', '_'])
            .unwrap_or(remaining.len());
        let (segment, rest) = remaining.split_at(end);
        segments.push(parse_segment(segment, separator)?);

        let mut rest_chars = rest.chars();
        match rest_chars.next() {
            Some(sep) => {
                separator = Some(sep);
                remaining = rest_chars.as_str();
            }
            None => break,
        }
    }
    Ok(segments)
}

/// Parses a single segment like `0rc1` into its components.
fn parse_segment(input: &str, separator: Option<char>) -> Result<Segment, ParseVersionErrorKind> {
    if input.is_empty() {
        return Err(ParseVersionErrorKind::EmptySegment);
    }

    let mut components = SmallVec::new();
    let mut remaining = input;
    while let Some(first) = remaining.chars().next() {
        let is_digit = first.is_ascii_digit();
        let end = remaining
            .find(|c: char| c.is_ascii_digit() != is_digit)
            .unwrap_or(remaining.len());
        let (text, rest) = remaining.split_at(end);
        let component = if is_digit {
            Component::Numeral(
                text.parse()
                    .map_err(ParseVersionErrorKind::InvalidNumeral)?,
            )
        } else {
            match text {
                "post" => Component::Post,
                "dev" => Component::Dev,
                _ => Component::Iden(text.into()),
            }
        };
        components.push(component);
        remaining = rest;
    }

    // A segment that starts with a string is treated as if it starts with a zero.
    let implicit_zero = !matches!(components.first(), Some(Component::Numeral(_)));
    if implicit_zero {
        components.insert(0, Component::Numeral(0));
    }

    Ok(Segment {
        separator,
        implicit_zero,
        components,
    })
}

#[cfg(test)]
mod test {
    use super::{ParseVersionError, ParseVersionErrorKind};
    use crate::Version;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case("", ParseVersionErrorKind::Empty)]
    #[case("  ", ParseVersionErrorKind::Empty)]
    #[case("1..0", ParseVersionErrorKind::EmptySegment)]
    #[case(".1", ParseVersionErrorKind::EmptySegment)]
    #[case("1.", ParseVersionErrorKind::EmptySegment)]
    #[case("1.0+", ParseVersionErrorKind::EmptyLocalVersion)]
    #[case("1.0+a+b", ParseVersionErrorKind::DuplicateLocalVersionSeparator)]
    #[case("1!2!3", ParseVersionErrorKind::DuplicateEpochSeparator)]
    #[case("1.0$", ParseVersionErrorKind::InvalidCharacter('$'))]
    #[case("1.0 2", ParseVersionErrorKind::InvalidCharacter(' '))]
    fn test_parse_errors(#[case] input: &str, #[case] kind: ParseVersionErrorKind) {
        assert_eq!(
            Version::from_str(input).unwrap_err(),
            ParseVersionError::new(input, kind)
        );
    }

    #[test]
    fn test_invalid_numbers() {
        assert_matches!(
            Version::from_str("a!1.0").unwrap_err().kind,
            ParseVersionErrorKind::EpochMustBeInteger(_)
        );
        assert_matches!(
            Version::from_str("1.99999999999999999999999").unwrap_err().kind,
            ParseVersionErrorKind::InvalidNumeral(_)
        );
    }

    #[test]
    fn test_components() {
        let version = Version::from_str("1.0rc1.post2").unwrap();
        insta::assert_debug_snapshot!(version.segments().collect::<Vec<_>>(), @r###"
        [
            [
                Numeral(
                    1,
                ),
            ],
            [
                Numeral(
                    0,
                ),
                Iden(
                    "rc",
                ),
                Numeral(
                    1,
                ),
            ],
            [
                Numeral(
                    0,
                ),
                Post,
                Numeral(
                    2,
                ),
            ],
        ]
        "###);
    }
}
