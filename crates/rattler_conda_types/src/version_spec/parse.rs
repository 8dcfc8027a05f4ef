use super::{
    EqualityOperator, LogicalOperator, RangeOperator, StrictRangeOperator, VersionSpec,
};
use crate::{version::ParseVersionError, ParseStrictness, Version};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt, value},
    multi::separated_list1,
    sequence::delimited,
    IResult, Parser,
};
use std::str::FromStr;
use thiserror::Error;

/// An error that can occur when parsing a [`VersionSpec`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseVersionSpecError {
    /// The spec was empty
    #[error("empty version spec")]
    Empty,

    /// The version inside the spec is invalid
    #[error("invalid version: {0}")]
    InvalidVersion(#[source] ParseVersionError),

    /// The operator is not followed by a version
    #[error("missing version after operator in '{0}'")]
    MissingVersion(String),

    /// The spec could not be split into its constraints, e.g. unbalanced parentheses.
    #[error("invalid version spec '{0}'")]
    InvalidSyntax(String),

    /// A glob was combined with an operator that does not support it
    #[error("the operator '{operator}' cannot be combined with a glob in '{constraint}'")]
    GlobVersionIncompatibleWithOperator {
        /// The operator
        operator: String,
        /// The constraint that contains the glob
        constraint: String,
    },

    /// A glob in the middle of a version, e.g. `1.*.2`
    #[error("regex constraints are not supported: '{0}'")]
    RegexConstraintsNotSupported(String),
}

/// The operator of a single constraint.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Operator {
    Range(RangeOperator),
    Equality(EqualityOperator),
    Compatible,
    StartsWith,
}

impl Operator {
    fn as_str(&self) -> &'static str {
        match self {
            Operator::Range(RangeOperator::Greater) => ">",
            Operator::Range(RangeOperator::GreaterEquals) => ">=",
            Operator::Range(RangeOperator::Less) => "<",
            Operator::Range(RangeOperator::LessEquals) => "<=",
            Operator::Equality(EqualityOperator::Equals) => "==",
            Operator::Equality(EqualityOperator::NotEquals) => "!=",
            Operator::Compatible => "~=",
            Operator::StartsWith => "=",
        }
    }
}

/// The syntax tree of a version spec before the individual constraints are parsed.
#[derive(Debug, Clone, Eq, PartialEq)]
enum VersionTree<'a> {
    Term(&'a str),
    Group(LogicalOperator, Vec<VersionTree<'a>>),
}

/// Removes whitespace around operators and separators so `>= 1.0 , < 2` becomes `>=1.0,<2`.
pub(crate) fn strip_operator_whitespace(input: &str) -> String {
    const OPERATOR_CHARS: &[char] = &['=', '<', '>', '!', '~', ',', '|', '(', ')'];
    let mut result = String::with_capacity(input.len());
    let mut chars = input.trim().chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            let previous_is_operator = result.ends_with(OPERATOR_CHARS);
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            let next_is_separator = chars.peek().is_some_and(|c| matches!(*c, ',' | '|' | ')'));
            if !previous_is_operator && !next_is_separator {
                result.push(' ');
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn parse_operator(input: &str) -> IResult<&str, Operator> {
    alt((
        value(Operator::Equality(EqualityOperator::Equals), tag("==")),
        value(Operator::Equality(EqualityOperator::NotEquals), tag("!=")),
        value(Operator::Range(RangeOperator::GreaterEquals), tag(">=")),
        value(Operator::Range(RangeOperator::LessEquals), tag("<=")),
        value(Operator::Compatible, tag("~=")),
        value(Operator::Range(RangeOperator::Greater), tag(">")),
        value(Operator::Range(RangeOperator::Less), tag("<")),
        value(Operator::StartsWith, tag("=")),
    ))
    .parse(input)
}

fn is_term_char(c: char) -> bool {
    !matches!(c, ',' | '|' | '(' | ')') && !c.is_whitespace()
}

fn group(op: LogicalOperator, mut terms: Vec<VersionTree<'_>>) -> VersionTree<'_> {
    if terms.len() == 1 {
        return terms.remove(0);
    }
    let mut flattened = Vec::with_capacity(terms.len());
    for term in terms {
        match term {
            VersionTree::Group(child_op, children) if child_op == op => {
                flattened.extend(children);
            }
            term => flattened.push(term),
        }
    }
    VersionTree::Group(op, flattened)
}

fn parse_or_group(input: &str) -> IResult<&str, VersionTree<'_>> {
    map(
        separated_list1(char('|'), parse_and_group),
        |terms| group(LogicalOperator::Or, terms),
    )
    .parse(input)
}

fn parse_and_group(input: &str) -> IResult<&str, VersionTree<'_>> {
    map(separated_list1(char(','), parse_term), |terms| {
        group(LogicalOperator::And, terms)
    })
    .parse(input)
}

fn parse_term(input: &str) -> IResult<&str, VersionTree<'_>> {
    alt((
        delimited(char('('), parse_or_group, char(')')),
        map(take_while1(is_term_char), VersionTree::Term),
    ))
    .parse(input)
}

fn parse_tree(input: &str) -> IResult<&str, VersionTree<'_>> {
    all_consuming(delimited(multispace0, parse_or_group, multispace0)).parse(input)
}

/// Parses a single constraint like `>=1.2` or `1.2.*`.
fn parse_constraint(
    input: &str,
    strictness: ParseStrictness,
) -> Result<VersionSpec, ParseVersionSpecError> {
    let (version_str, operator) = opt(parse_operator)
        .parse(input)
        .map_err(|_| ParseVersionSpecError::InvalidSyntax(input.to_owned()))?;

    if version_str.is_empty() {
        return Err(ParseVersionSpecError::MissingVersion(input.to_owned()));
    }

    // A version consisting only of `*` and `.` matches everything.
    if version_str.chars().all(|c| matches!(c, '*' | '.')) {
        return match operator {
            None | Some(Operator::StartsWith | Operator::Equality(EqualityOperator::Equals)) => {
                Ok(VersionSpec::Any)
            }
            Some(Operator::Equality(EqualityOperator::NotEquals)) => Ok(VersionSpec::None),
            Some(op) => Err(ParseVersionSpecError::GlobVersionIncompatibleWithOperator {
                operator: op.as_str().to_owned(),
                constraint: input.to_owned(),
            }),
        };
    }

    let glob_stripped = version_str
        .strip_suffix(".*")
        .or_else(|| version_str.strip_suffix('*'));
    let (version_str, is_glob) = match glob_stripped {
        Some(stripped) => (stripped, true),
        None => (version_str, false),
    };
    if version_str.contains('*') {
        return Err(ParseVersionSpecError::RegexConstraintsNotSupported(
            input.to_owned(),
        ));
    }

    let version = Version::from_str(version_str).map_err(ParseVersionSpecError::InvalidVersion)?;

    let spec = match (operator, is_glob) {
        (None | Some(Operator::StartsWith | Operator::Equality(EqualityOperator::Equals)), true)
        | (Some(Operator::StartsWith), false) => {
            VersionSpec::StrictRange(StrictRangeOperator::StartsWith, version)
        }
        (Some(Operator::Equality(EqualityOperator::NotEquals)), true) => {
            VersionSpec::StrictRange(StrictRangeOperator::NotStartsWith, version)
        }
        (None, false) => VersionSpec::Exact(EqualityOperator::Equals, version),
        (Some(Operator::Equality(op)), false) => VersionSpec::Exact(op, version),
        (Some(Operator::Compatible), false) => {
            VersionSpec::StrictRange(StrictRangeOperator::Compatible, version)
        }
        (Some(Operator::Range(op)), false) => VersionSpec::Range(op, version),
        (Some(op @ (Operator::Range(_) | Operator::Compatible)), true) => {
            if strictness == ParseStrictness::Strict {
                return Err(ParseVersionSpecError::GlobVersionIncompatibleWithOperator {
                    operator: op.as_str().to_owned(),
                    constraint: input.to_owned(),
                });
            }
            tracing::warn!("ignoring the trailing glob in version constraint '{input}'");
            match op {
                Operator::Range(op) => VersionSpec::Range(op, version),
                _ => VersionSpec::StrictRange(StrictRangeOperator::Compatible, version),
            }
        }
    };

    Ok(spec)
}

fn tree_to_spec(
    tree: VersionTree<'_>,
    strictness: ParseStrictness,
) -> Result<VersionSpec, ParseVersionSpecError> {
    match tree {
        VersionTree::Term(term) => parse_constraint(term, strictness),
        VersionTree::Group(op, children) => Ok(VersionSpec::Group(
            op,
            children
                .into_iter()
                .map(|child| tree_to_spec(child, strictness))
                .collect::<Result<_, _>>()?,
        )),
    }
}

/// Parses a string into a [`VersionSpec`].
pub(super) fn parse_version_spec(
    input: &str,
    strictness: ParseStrictness,
) -> Result<VersionSpec, ParseVersionSpecError> {
    let normalized = strip_operator_whitespace(input);
    if normalized.is_empty() {
        return Err(ParseVersionSpecError::Empty);
    }

    let (_, tree) = parse_tree(&normalized)
        .map_err(|_| ParseVersionSpecError::InvalidSyntax(input.to_owned()))?;
    tree_to_spec(tree, strictness)
}
