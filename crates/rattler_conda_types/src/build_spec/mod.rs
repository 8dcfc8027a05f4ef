//! Constraints on the build number of a package, like `>=3`.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{digit1, multispace0},
    combinator::{all_consuming, map_res, opt, value},
    sequence::{delimited, pair},
    IResult, Parser,
};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;

/// The build number of a package.
pub type BuildNumber = u64;

/// An operator that compares two build numbers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OrdOperator {
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `==`, also written as a bare number
    Eq,
    /// `!=`
    Ne,
}

impl Display for OrdOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OrdOperator::Gt => write!(f, ">"),
            OrdOperator::Ge => write!(f, ">="),
            OrdOperator::Lt => write!(f, "<"),
            OrdOperator::Le => write!(f, "<="),
            OrdOperator::Eq => write!(f, "=="),
            OrdOperator::Ne => write!(f, "!="),
        }
    }
}

/// A constraint on a build number.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct BuildNumberSpec {
    op: OrdOperator,
    rhs: BuildNumber,
}

/// An error that occurred while parsing a [`BuildNumberSpec`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseBuildNumberSpecError {
    /// The string is not a valid build number constraint.
    #[error("invalid build number constraint '{0}'")]
    InvalidConstraint(String),
}

impl BuildNumberSpec {
    /// Constructs a new constraint.
    pub fn new(op: OrdOperator, rhs: BuildNumber) -> Self {
        Self { op, rhs }
    }

    /// Returns true if the build number satisfies the constraint.
    pub fn matches(&self, build_number: &BuildNumber) -> bool {
        match self.op {
            OrdOperator::Gt => build_number > &self.rhs,
            OrdOperator::Ge => build_number >= &self.rhs,
            OrdOperator::Lt => build_number < &self.rhs,
            OrdOperator::Le => build_number <= &self.rhs,
            OrdOperator::Eq => build_number == &self.rhs,
            OrdOperator::Ne => build_number != &self.rhs,
        }
    }
}

fn parse_operator(input: &str) -> IResult<&str, OrdOperator> {
    alt((
        value(OrdOperator::Ge, tag(">=")),
        value(OrdOperator::Le, tag("<=")),
        value(OrdOperator::Eq, tag("==")),
        value(OrdOperator::Ne, tag("!=")),
        value(OrdOperator::Gt, tag(">")),
        value(OrdOperator::Lt, tag("<")),
        value(OrdOperator::Eq, tag("=")),
    ))
    .parse(input)
}

fn parse_build_number_spec(input: &str) -> IResult<&str, BuildNumberSpec> {
    all_consuming(delimited(
        multispace0,
        pair(
            opt(delimited(multispace0, parse_operator, multispace0)),
            map_res(digit1, str::parse::<BuildNumber>),
        ),
        multispace0,
    ))
    .parse(input)
    .map(|(rest, (op, rhs))| {
        (
            rest,
            BuildNumberSpec {
                op: op.unwrap_or(OrdOperator::Eq),
                rhs,
            },
        )
    })
}

impl FromStr for BuildNumberSpec {
    type Err = ParseBuildNumberSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_build_number_spec(s)
            .map(|(_, spec)| spec)
            .map_err(|_| ParseBuildNumberSpecError::InvalidConstraint(s.to_owned()))
    }
}

impl Display for BuildNumberSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.op {
            OrdOperator::Eq => write!(f, "{}", self.rhs),
            op => write!(f, "{op}{}", self.rhs),
        }
    }
}
