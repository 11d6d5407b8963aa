//! Product version parsing and version-dependent widget selection.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A semver-like product version.
///
/// The product reports versions such as `5.11.2.1`; ordering considers the
/// first three segments and ignores the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProductVersion {
    /// Major component
    pub major: u64,
    /// Minor component
    pub minor: u64,
    /// Patch component
    pub patch: u64,
}

impl ProductVersion {
    /// Create a version from components
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The lowest possible version, used as a picker catch-all bound
    #[must_use]
    pub const fn lowest() -> Self {
        Self::new(0, 0, 0)
    }
}

impl PartialOrd for ProductVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProductVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl fmt::Display for ProductVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ProductVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let mut next = |name: &str| -> Result<u64, String> {
            match parts.next() {
                None | Some("") => Ok(0),
                Some(p) => p
                    .parse::<u64>()
                    .map_err(|_| format!("invalid {name} segment in version {s:?}")),
            }
        };
        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;
        Ok(Self::new(major, minor, patch))
    }
}

/// Picks a value by product version.
///
/// Entries map a lower-bound version to a value; [`VersionPicker::pick`]
/// selects the entry with the highest bound not exceeding the given
/// version. Views resolve their pick at construction time so widgets
/// receive a concrete value, not a picker.
#[derive(Debug, Clone)]
pub struct VersionPicker<T> {
    entries: Vec<(ProductVersion, T)>,
}

impl<T> VersionPicker<T> {
    /// Create a picker from `(lower bound, value)` entries.
    ///
    /// # Panics
    ///
    /// Panics when `entries` is empty; a picker with no branches cannot
    /// resolve anything.
    #[must_use]
    pub fn new(mut entries: Vec<(ProductVersion, T)>) -> Self {
        assert!(!entries.is_empty(), "VersionPicker requires at least one entry");
        entries.sort_by_key(|(bound, _)| *bound);
        Self { entries }
    }

    /// Select the value for `version`.
    ///
    /// Falls back to the lowest-bound entry when `version` precedes all
    /// bounds.
    #[must_use]
    pub fn pick(&self, version: ProductVersion) -> &T {
        self.entries
            .iter()
            .rev()
            .find(|(bound, _)| *bound <= version)
            .map_or(&self.entries[0].1, |(_, value)| value)
    }
}
