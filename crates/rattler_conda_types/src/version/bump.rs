use super::{Component, Version};
use thiserror::Error;

/// Which segment of a version to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionBumpType {
    /// Bump the first segment
    Major,
    /// Bump the second segment
    Minor,
    /// Bump the third segment
    Patch,
    /// Bump the last segment
    Last,
}

/// Errors that can occur when bumping a version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionBumpError {
    /// The version does not have the segment that should be bumped.
    #[error("cannot bump segment {index}, the version only has {count} segments")]
    InvalidSegment {
        /// The index of the segment
        index: usize,
        /// The number of segments in the version
        count: usize,
    },

    /// The segment does not contain a number to increment.
    #[error("segment {0} does not contain a number")]
    NoNumeral(usize),
}

impl Version {
    /// Returns a new version where the last number in the selected segment is incremented by one.
    ///
    /// ```
    /// # use rattler_conda_types::{Version, VersionBumpType};
    /// # use std::str::FromStr;
    /// let version = Version::from_str("1.2.3").unwrap();
    /// assert_eq!(version.bump(VersionBumpType::Minor).unwrap().to_string(), "1.3.3");
    /// ```
    pub fn bump(&self, bump_type: VersionBumpType) -> Result<Version, VersionBumpError> {
        let count = self.segments.len();
        let index = match bump_type {
            VersionBumpType::Major => 0,
            VersionBumpType::Minor => 1,
            VersionBumpType::Patch => 2,
            VersionBumpType::Last => count.saturating_sub(1),
        };
        if index >= count {
            return Err(VersionBumpError::InvalidSegment { index, count });
        }

        let mut result = self.clone();
        let segment = &mut result.segments[index];
        let numeral = segment
            .components
            .iter_mut()
            .rev()
            .find_map(|component| match component {
                Component::Numeral(n) => Some(n),
                _ => None,
            })
            .ok_or(VersionBumpError::NoNumeral(index))?;
        *numeral += 1;

        // The implicit zero becomes a real number once it was bumped.
        if segment.implicit_zero
            && !matches!(segment.components.first(), Some(Component::Numeral(0)))
        {
            segment.implicit_zero = false;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::{VersionBumpError, VersionBumpType};
    use crate::Version;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case("1.2.3", VersionBumpType::Major, "2.2.3")]
    #[case("1.2.3", VersionBumpType::Minor, "1.3.3")]
    #[case("1.2.3", VersionBumpType::Patch, "1.2.4")]
    #[case("1.2.3", VersionBumpType::Last, "1.2.4")]
    #[case("1.2.3rc1", VersionBumpType::Last, "1.2.3rc2")]
    #[case("1!2.0+3", VersionBumpType::Major, "1!3.0+3")]
    fn test_bump(#[case] input: &str, #[case] bump: VersionBumpType, #[case] expected: &str) {
        let bumped = Version::from_str(input).unwrap().bump(bump).unwrap();
        assert_eq!(bumped.to_string(), expected);
    }

    #[test]
    fn test_bump_missing_segment() {
        assert_eq!(
            Version::from_str("1.2")
                .unwrap()
                .bump(VersionBumpType::Patch)
                .unwrap_err(),
            VersionBumpError::InvalidSegment { index: 2, count: 2 }
        );
    }
}
