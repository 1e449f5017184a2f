//! Version tags for builder checkpoints.

use std::fmt;
use std::str::FromStr;

use anyhow::{Error, anyhow};

/// Three-component version, ordered numerically by (major, minor, patch).
///
/// Created tags are immutable and never reused; the allocator only ever
/// proposes a patch bump over the tag it selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionTag {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl VersionTag {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Next patch release on the same major/minor line.
    pub fn bump_patch(self) -> Self {
        Self {
            patch: self.patch + 1,
            ..self
        }
    }
}

impl FromStr for VersionTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(anyhow!("expected major.minor.patch, got '{s}'"));
        }
        let component = |part: &str| -> Result<u64, Error> {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(anyhow!("non-numeric component '{part}' in '{s}'"));
            }
            part.parse::<u64>()
                .map_err(|err| anyhow!("component '{part}' in '{s}': {err}"))
        };
        Ok(Self {
            major: component(parts[0])?,
            minor: component(parts[1])?,
            patch: component(parts[2])?,
        })
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Propose the next tag given the existing (unordered) tag names.
///
/// Selects the lexicographically last raw string, not the numerically
/// greatest version, so "10.0.0" sorts before "9.0.0". When that string is
/// not a plain x.y.z the fallback is `0.0.{iteration}`; with no tags at all
/// the first proposal is `0.0.0`. No collision check: a duplicate name
/// surfaces later as a non-fatal tag-creation warning.
pub fn next_version(tags: &[String], iteration: u32) -> VersionTag {
    let Some(last) = tags.iter().max() else {
        return VersionTag::new(0, 0, 0);
    };
    match last.parse::<VersionTag>() {
        Ok(tag) => tag.bump_patch(),
        Err(_) => VersionTag::new(0, 0, u64::from(iteration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn parses_plain_semver_triples() {
        let tag: VersionTag = "1.2.3".parse().expect("parse");
        assert_eq!(tag, VersionTag::new(1, 2, 3));
        assert_eq!(tag.to_string(), "1.2.3");
    }

    #[test]
    fn rejects_non_triple_shapes() {
        assert!("1.2".parse::<VersionTag>().is_err());
        assert!("1.2.3.4".parse::<VersionTag>().is_err());
        assert!("v1.2.3".parse::<VersionTag>().is_err());
        assert!("1.2.x".parse::<VersionTag>().is_err());
        assert!("1..3".parse::<VersionTag>().is_err());
    }

    #[test]
    fn orders_numerically_by_component() {
        let small: VersionTag = "9.0.0".parse().expect("parse");
        let big: VersionTag = "10.0.0".parse().expect("parse");
        assert!(small < big);
    }

    #[test]
    fn bumps_patch_of_single_tag() {
        assert_eq!(next_version(&tags(&["1.2.3"]), 7).to_string(), "1.2.4");
    }

    #[test]
    fn empty_tag_list_starts_at_zero() {
        assert_eq!(next_version(&[], 0).to_string(), "0.0.0");
        // The first proposal ignores the iteration counter.
        assert_eq!(next_version(&[], 5).to_string(), "0.0.0");
    }

    #[test]
    fn unparsable_last_tag_falls_back_to_iteration() {
        assert_eq!(next_version(&tags(&["abc"]), 3).to_string(), "0.0.3");
        assert_eq!(next_version(&tags(&["v1.2.3"]), 1).to_string(), "0.0.1");
    }

    #[test]
    fn selects_lexicographically_last_raw_string() {
        // "9.0.0" > "10.0.0" as strings, so the proposal tracks 9.0.x.
        let existing = tags(&["10.0.0", "9.0.0"]);
        assert_eq!(next_version(&existing, 1).to_string(), "9.0.1");
    }

    #[test]
    fn unparsable_lexicographic_winner_masks_numeric_tags() {
        // "zzz" wins the string ordering even though numeric tags exist.
        let existing = tags(&["1.2.3", "zzz"]);
        assert_eq!(next_version(&existing, 4).to_string(), "0.0.4");
    }
}
