use super::{matcher::StringMatcherParseError, MatchSpec, NamelessMatchSpec, StringMatcher};
use crate::{
    build_spec::{BuildNumberSpec, ParseBuildNumberSpecError},
    version_spec::{
        parse::strip_operator_whitespace, EqualityOperator, ParseVersionSpecError,
        StrictRangeOperator,
    },
    Channel, ChannelConfig, InvalidPackageNameError, PackageName, ParseChannelError,
    ParseStrictness, Platform, Version, VersionSpec,
};
use rattler_digest::{parse_digest_from_hex, Md5, Sha256};
use std::{str::FromStr, sync::Arc};
use thiserror::Error;

/// The type of parse error that occurred when parsing match spec.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseMatchSpecError {
    /// The spec does not contain a package name
    #[error("missing package name")]
    MissingPackageName,

    /// The package name is invalid
    #[error(transparent)]
    InvalidPackageName(#[from] InvalidPackageNameError),

    /// The version spec is invalid
    #[error("invalid version spec: {0}")]
    InvalidVersionSpec(#[from] ParseVersionSpecError),

    /// The build string matcher is invalid
    #[error("invalid build string: {0}")]
    InvalidBuildString(#[from] StringMatcherParseError),

    /// The build number constraint is invalid
    #[error(transparent)]
    InvalidBuildNumber(#[from] ParseBuildNumberSpecError),

    /// The channel is invalid
    #[error("invalid channel: {0}")]
    ParseChannelError(#[from] ParseChannelError),

    /// The bracket section is not closed or malformed
    #[error("invalid bracket in '{0}'")]
    InvalidBracket(String),

    /// The key in a bracket section is not supported
    #[error("invalid bracket key: {0}")]
    InvalidBracketKey(String),

    /// A property is defined more than once
    #[error("found multiple values for: {0}")]
    MultipleValueForKey(String),

    /// A hash digest is not valid hex of the right length
    #[error("unable to parse hash digest from hex: {0}")]
    InvalidHashDigest(String),

    /// More than one `::` in the spec
    #[error("invalid number of colons in '{0}'")]
    InvalidNumberOfColons(String),

    /// Too many whitespace separated parts after the package name
    #[error("unable to parse version and build from '{0}'")]
    InvalidVersionAndBuild(String),
}

/// Removes a `#` comment.
fn strip_comment(input: &str) -> &str {
    input.split_once('#').map_or(input, |(spec, _)| spec).trim()
}

/// Splits off a trailing `[key=value, ...]` section. The opening bracket is found by walking back
/// from the closing bracket so that brackets in quoted values or regex build strings don't
/// confuse the split.
fn strip_brackets(input: &str) -> Result<(&str, Option<&str>), ParseMatchSpecError> {
    if !input.ends_with(']') {
        return Ok((input, None));
    }

    let mut depth = 0usize;
    let mut quote = None;
    for (idx, c) in input.char_indices().rev() {
        match (c, quote) {
            ('"' | '\'', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            (_, Some(_)) => {}
            (']', None) => depth += 1,
            ('[', None) => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[..idx], Some(&input[idx + 1..input.len() - 1])));
                }
            }
            _ => {}
        }
    }

    Err(ParseMatchSpecError::InvalidBracket(input.to_owned()))
}

/// Splits the contents of a bracket section into key value pairs. Commas inside quotes do not
/// separate pairs and surrounding quotes are removed from the values.
fn parse_bracket_list(input: &str) -> Result<Vec<(&str, &str)>, ParseMatchSpecError> {
    let mut entries = Vec::new();
    let mut quote = None;
    let mut start = 0;
    for (idx, c) in input.char_indices() {
        match (c, quote) {
            ('"' | '\'', None) => quote = Some(c),
            (c, Some(q)) if c == q => quote = None,
            (',', None) => {
                entries.push(&input[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(ParseMatchSpecError::InvalidBracket(input.to_owned()));
    }
    entries.push(&input[start..]);

    entries
        .into_iter()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| ParseMatchSpecError::InvalidBracket(entry.to_owned()))?;
            Ok((key.trim(), unquote(value.trim())))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|value| value.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Parses `channel` or `channel/subdir`. A `*` channel matches every channel.
fn parse_channel_and_subdir(
    input: &str,
) -> Result<(Option<Arc<Channel>>, Option<String>), ParseMatchSpecError> {
    let (channel, subdir) = match input.rsplit_once('/') {
        Some((channel, subdir)) if Platform::from_str(subdir).is_ok() => {
            (channel, Some(subdir.to_owned()))
        }
        _ => (input, None),
    };

    let channel = if channel == "*" {
        None
    } else {
        let config = ChannelConfig::default();
        Some(Arc::new(Channel::from_str(channel, &config)?))
    };
    Ok((channel, subdir))
}

/// Splits `=1.2=py_0` into the version and the build. The build starts at the last `=` that is
/// not part of an operator.
fn split_trailing_build(input: &str) -> (&str, Option<&str>) {
    for (idx, c) in input.char_indices().rev() {
        if c != '=' || idx == 0 {
            continue;
        }
        let previous = input[..idx].chars().next_back();
        if !matches!(previous, Some('=' | '!' | '<' | '>' | '~' | ',' | '|' | '(')) {
            return (&input[..idx], Some(&input[idx + 1..]));
        }
    }
    (input, None)
}

fn is_plain_version(input: &str) -> bool {
    !input.is_empty()
        && input
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | '+' | '!'))
}

/// Parses the version part of a spec. A plain version without a build matches every version that
/// starts with it, with a build it must match exactly.
fn parse_version(
    input: &str,
    has_build: bool,
    strictness: ParseStrictness,
) -> Result<Option<VersionSpec>, ParseMatchSpecError> {
    let input = match input.strip_prefix('=') {
        Some(rest) if !rest.starts_with('=') => rest,
        _ => input,
    };

    if input == "*" {
        return Ok(None);
    }

    if is_plain_version(input) {
        let version = Version::from_str(input).map_err(ParseVersionSpecError::InvalidVersion)?;
        return Ok(Some(if has_build {
            VersionSpec::Exact(EqualityOperator::Equals, version)
        } else {
            VersionSpec::StrictRange(StrictRangeOperator::StartsWith, version)
        }));
    }

    Ok(Some(VersionSpec::from_str(input, strictness)?))
}

fn parse_build(input: &str) -> Result<Option<StringMatcher>, ParseMatchSpecError> {
    if input == "*" {
        return Ok(None);
    }
    Ok(Some(StringMatcher::from_str(input)?))
}

/// Parses the whitespace normalized `version build` part of a spec.
fn parse_version_and_build(
    input: &str,
    strictness: ParseStrictness,
) -> Result<(Option<VersionSpec>, Option<StringMatcher>), ParseMatchSpecError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok((None, None));
    }

    let parts: Vec<&str> = input.split_whitespace().collect();
    let (version, build) = match parts.as_slice() {
        [version_and_build] => split_trailing_build(version_and_build),
        [version, build] => (*version, Some(*build)),
        _ => return Err(ParseMatchSpecError::InvalidVersionAndBuild(input.to_owned())),
    };

    let build = build.map(parse_build).transpose()?.flatten();
    let version = parse_version(version, build.is_some(), strictness)?;
    Ok((version, build))
}

/// Sets a field from the bracket section. In strict mode a value that was already set outside of
/// the brackets is an error, in lenient mode the bracket value wins.
fn set_bracket_value<T>(
    field: &mut Option<T>,
    value: Option<T>,
    key: &str,
    strictness: ParseStrictness,
) -> Result<(), ParseMatchSpecError> {
    if field.is_some() && strictness == ParseStrictness::Strict {
        return Err(ParseMatchSpecError::MultipleValueForKey(key.to_owned()));
    }
    *field = value;
    Ok(())
}

fn apply_brackets(
    spec: &mut NamelessMatchSpec,
    brackets: &str,
    strictness: ParseStrictness,
) -> Result<(), ParseMatchSpecError> {
    for (key, value) in parse_bracket_list(brackets)? {
        match key {
            "version" => {
                let version = Some(VersionSpec::from_str(value, strictness)?);
                set_bracket_value(&mut spec.version, version, key, strictness)?;
            }
            "build" => set_bracket_value(&mut spec.build, parse_build(value)?, key, strictness)?,
            "build_number" => {
                let build_number = Some(BuildNumberSpec::from_str(value)?);
                set_bracket_value(&mut spec.build_number, build_number, key, strictness)?;
            }
            "fn" => set_bracket_value(
                &mut spec.file_name,
                Some(value.to_owned()),
                key,
                strictness,
            )?,
            "md5" => {
                let md5 = parse_digest_from_hex::<Md5>(value)
                    .ok_or_else(|| ParseMatchSpecError::InvalidHashDigest(value.to_owned()))?;
                set_bracket_value(&mut spec.md5, Some(md5), key, strictness)?;
            }
            "sha256" => {
                let sha256 = parse_digest_from_hex::<Sha256>(value)
                    .ok_or_else(|| ParseMatchSpecError::InvalidHashDigest(value.to_owned()))?;
                set_bracket_value(&mut spec.sha256, Some(sha256), key, strictness)?;
            }
            "subdir" => set_bracket_value(
                &mut spec.subdir,
                Some(value.to_owned()),
                key,
                strictness,
            )?,
            "channel" => {
                let (channel, subdir) = parse_channel_and_subdir(value)?;
                set_bracket_value(&mut spec.channel, channel, key, strictness)?;
                if subdir.is_some() {
                    set_bracket_value(&mut spec.subdir, subdir, "subdir", strictness)?;
                }
            }
            "license" => set_bracket_value(
                &mut spec.license,
                Some(value.to_owned()),
                key,
                strictness,
            )?,
            _ if strictness == ParseStrictness::Strict => {
                return Err(ParseMatchSpecError::InvalidBracketKey(key.to_owned()));
            }
            _ => tracing::warn!("ignoring unsupported match spec key '{key}'"),
        }
    }
    Ok(())
}

/// Splits a normalized spec into the package name and the rest. The name ends at whitespace or
/// at the first operator character.
fn split_name(input: &str) -> (&str, &str) {
    let end = input
        .find(|c: char| c.is_whitespace() || matches!(c, '=' | '<' | '>' | '!' | '~'))
        .unwrap_or(input.len());
    (&input[..end], &input[end..])
}

pub(super) fn parse_match_spec(
    input: &str,
    strictness: ParseStrictness,
) -> Result<MatchSpec, ParseMatchSpecError> {
    let (spec, brackets) = strip_brackets(strip_comment(input))?;

    let mut nameless = NamelessMatchSpec::default();
    let spec = match spec.split_once("::") {
        Some((_, rest)) if rest.contains("::") => {
            return Err(ParseMatchSpecError::InvalidNumberOfColons(input.to_owned()));
        }
        Some((channel, rest)) => {
            let (channel, subdir) = parse_channel_and_subdir(channel.trim())?;
            nameless.channel = channel;
            nameless.subdir = subdir;
            rest
        }
        None => spec,
    };

    let spec = strip_operator_whitespace(spec);
    let (name, rest) = split_name(&spec);
    if name.is_empty() || name == "*" {
        return Err(ParseMatchSpecError::MissingPackageName);
    }
    let name = PackageName::try_from(name)?;

    let (version, build) = parse_version_and_build(rest, strictness)?;
    nameless.version = version;
    nameless.build = build;

    if let Some(brackets) = brackets {
        apply_brackets(&mut nameless, brackets, strictness)?;
    }

    Ok(MatchSpec::from_nameless(nameless, name))
}

pub(super) fn parse_nameless_match_spec(
    input: &str,
    strictness: ParseStrictness,
) -> Result<NamelessMatchSpec, ParseMatchSpecError> {
    let (spec, brackets) = strip_brackets(strip_comment(input))?;

    let spec = strip_operator_whitespace(spec);
    let (version, build) = parse_version_and_build(&spec, strictness)?;
    let mut nameless = NamelessMatchSpec {
        version,
        build,
        ..NamelessMatchSpec::default()
    };

    if let Some(brackets) = brackets {
        apply_brackets(&mut nameless, brackets, strictness)?;
    }

    Ok(nameless)
}

impl MatchSpec {
    /// Parses a [`MatchSpec`] from a string with the given strictness.
    pub fn from_str(source: &str, strictness: ParseStrictness) -> Result<Self, ParseMatchSpecError> {
        parse_match_spec(source, strictness)
    }
}

impl FromStr for MatchSpec {
    type Err = ParseMatchSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_match_spec(s, ParseStrictness::Lenient)
    }
}

impl NamelessMatchSpec {
    /// Parses a [`NamelessMatchSpec`] from a string with the given strictness.
    pub fn from_str(source: &str, strictness: ParseStrictness) -> Result<Self, ParseMatchSpecError> {
        parse_nameless_match_spec(source, strictness)
    }
}

impl FromStr for NamelessMatchSpec {
    type Err = ParseMatchSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_nameless_match_spec(s, ParseStrictness::Lenient)
    }
}

#[cfg(test)]
mod test {
    use super::{
        parse_bracket_list, split_trailing_build, strip_brackets, ParseMatchSpecError,
    };
    use crate::{MatchSpec, ParseStrictness, VersionSpec};
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("=1.2=py_0", ("=1.2", Some("py_0")))]
    #[case("==1.2", ("==1.2", None))]
    #[case("=1.2", ("=1.2", None))]
    #[case(">=1.0,<2", (">=1.0,<2", None))]
    #[case(">=1.0,==2", (">=1.0,==2", None))]
    #[case("1.0=*", ("1.0", Some("*")))]
    fn test_split_trailing_build(#[case] input: &str, #[case] expected: (&str, Option<&str>)) {
        assert_eq!(split_trailing_build(input), expected);
    }

    #[test]
    fn test_brackets() {
        assert_eq!(
            strip_brackets("foo ^py3[0-9]$[md5=abc]").unwrap(),
            ("foo ^py3[0-9]$", Some("md5=abc"))
        );
        assert_eq!(strip_brackets("foo 1.0").unwrap(), ("foo 1.0", None));
        assert_matches!(
            strip_brackets("foo 1.0]"),
            Err(ParseMatchSpecError::InvalidBracket(_))
        );
        assert_eq!(
            parse_bracket_list("version='>=1.0,<2', build=\"py*\" ,fn=a.conda").unwrap(),
            vec![("version", ">=1.0,<2"), ("build", "py*"), ("fn", "a.conda")]
        );
    }

    #[rstest]
    #[case("foo", "foo")]
    #[case("foo ==1.0", "foo ==1.0")]
    #[case("foo >= 1.0 , < 2.0", "foo >=1.0,<2.0")]
    #[case("foo=1.0", "foo 1.0.*")]
    #[case("foo 1.0", "foo 1.0.*")]
    #[case("foo=1.0=py_0", "foo ==1.0 py_0")]
    #[case("foo 1.0 py_0", "foo ==1.0 py_0")]
    #[case("foo * py_0", "foo * py_0")]
    #[case("foo *", "foo")]
    #[case("foo=1.0=*", "foo 1.0.*")]
    #[case("conda-forge::foo", "conda-forge::foo")]
    #[case("conda-forge/linux-64::foo", "conda-forge/linux-64::foo")]
    #[case("foo[subdir=linux-64]", "foo[subdir=\"linux-64\"]")]
    #[case("foo[version='>=1.0', build=py*]", "foo >=1.0 py*")]
    #[case("foo >=1.0 # a comment", "foo >=1.0")]
    #[case("foo[build_number='>=2', license=MIT]", "foo[build_number=\">=2\", license=\"MIT\"]")]
    fn test_display(#[case] input: &str, #[case] expected: &str) {
        let spec = MatchSpec::from_str(input, ParseStrictness::Strict).unwrap();
        assert_eq!(spec.to_string(), expected);
    }

    #[test]
    fn test_version_forms() {
        let spec = MatchSpec::from_str("foo=1.2", ParseStrictness::Strict).unwrap();
        assert_matches!(spec.version, Some(VersionSpec::StrictRange(..)));
        let spec = MatchSpec::from_str("foo=1.2=py_0", ParseStrictness::Strict).unwrap();
        assert_matches!(spec.version, Some(VersionSpec::Exact(..)));
        let spec = MatchSpec::from_str("foo>=1.2", ParseStrictness::Strict).unwrap();
        assert_matches!(spec.version, Some(VersionSpec::Range(..)));
    }

    #[test]
    fn test_errors() {
        assert_matches!(
            MatchSpec::from_str("", ParseStrictness::Lenient),
            Err(ParseMatchSpecError::MissingPackageName)
        );
        assert_matches!(
            MatchSpec::from_str(">=1.0", ParseStrictness::Lenient),
            Err(ParseMatchSpecError::MissingPackageName)
        );
        assert_matches!(
            MatchSpec::from_str("a::b::foo", ParseStrictness::Lenient),
            Err(ParseMatchSpecError::InvalidNumberOfColons(_))
        );
        assert_matches!(
            MatchSpec::from_str("foo 1.0 py_0 extra", ParseStrictness::Lenient),
            Err(ParseMatchSpecError::InvalidVersionAndBuild(_))
        );
        assert_matches!(
            MatchSpec::from_str("foo[md5=xyz]", ParseStrictness::Lenient),
            Err(ParseMatchSpecError::InvalidHashDigest(_))
        );
        assert_matches!(
            MatchSpec::from_str("foo >=1..0", ParseStrictness::Lenient),
            Err(ParseMatchSpecError::InvalidVersionSpec(_))
        );
        assert_matches!(
            MatchSpec::from_str("foo[build_number=abc]", ParseStrictness::Lenient),
            Err(ParseMatchSpecError::InvalidBuildNumber(_))
        );
    }

    #[test]
    fn test_strictness() {
        assert_matches!(
            MatchSpec::from_str("foo[unknown=1]", ParseStrictness::Strict),
            Err(ParseMatchSpecError::InvalidBracketKey(_))
        );
        assert!(MatchSpec::from_str("foo[unknown=1]", ParseStrictness::Lenient).is_ok());

        assert_matches!(
            MatchSpec::from_str("foo >=1.0[version='<2']", ParseStrictness::Strict),
            Err(ParseMatchSpecError::MultipleValueForKey(_))
        );
        let spec =
            MatchSpec::from_str("foo >=1.0[version='<2']", ParseStrictness::Lenient).unwrap();
        assert_eq!(spec.to_string(), "foo <2");
    }
}
