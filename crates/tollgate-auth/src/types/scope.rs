//! Closed set of OAuth2 scopes.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A scope an access token may carry.
///
/// Variants are declared in lexical order of their wire names so that
/// [`ScopeSet`] iterates, and renders, sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// OpenID Connect authentication.
    Openid,
    /// Read GPS traces.
    ReadGpx,
    /// Read user preferences.
    ReadPrefs,
    /// Act as the first-party web session. Never requestable by third parties.
    WebUser,
    /// Modify the map.
    WriteApi,
    /// Create diary entries and comments.
    WriteDiary,
    /// Upload GPS traces.
    WriteGpx,
    /// Create and comment on notes.
    WriteNotes,
    /// Modify user preferences.
    WritePrefs,
    /// Redact map data.
    WriteRedactions,
}

impl Scope {
    /// Every scope, in lexical order.
    pub const ALL: [Scope; 10] = [
        Scope::Openid,
        Scope::ReadGpx,
        Scope::ReadPrefs,
        Scope::WebUser,
        Scope::WriteApi,
        Scope::WriteDiary,
        Scope::WriteGpx,
        Scope::WriteNotes,
        Scope::WritePrefs,
        Scope::WriteRedactions,
    ];

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Openid => "openid",
            Scope::ReadGpx => "read_gpx",
            Scope::ReadPrefs => "read_prefs",
            Scope::WebUser => "web_user",
            Scope::WriteApi => "write_api",
            Scope::WriteDiary => "write_diary",
            Scope::WriteGpx => "write_gpx",
            Scope::WriteNotes => "write_notes",
            Scope::WritePrefs => "write_prefs",
            Scope::WriteRedactions => "write_redactions",
        }
    }

    /// Private scopes are reserved for system applications.
    #[must_use]
    pub fn is_private(self) -> bool {
        match self {
            Scope::WebUser => true,
            Scope::Openid
            | Scope::ReadGpx
            | Scope::ReadPrefs
            | Scope::WriteApi
            | Scope::WriteDiary
            | Scope::WriteGpx
            | Scope::WriteNotes
            | Scope::WritePrefs
            | Scope::WriteRedactions => false,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope name that is not part of the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scope: {0}")]
pub struct UnknownScope(pub String);

impl FromStr for Scope {
    type Err = UnknownScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| UnknownScope(s.to_string()))
    }
}

/// An ordered, duplicate-free set of scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    /// Empty set.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Every scope a third-party application may be granted.
    #[must_use]
    pub fn public() -> Self {
        Scope::ALL.into_iter().filter(|s| !s.is_private()).collect()
    }

    /// Parses a space-delimited scope string.
    ///
    /// # Errors
    ///
    /// Returns every unrecognised name, in input order.
    pub fn parse(raw: &str) -> Result<Self, Vec<String>> {
        let mut scopes = BTreeSet::new();
        let mut unknown = Vec::new();
        for name in raw.split_whitespace() {
            match name.parse::<Scope>() {
                Ok(scope) => {
                    scopes.insert(scope);
                }
                Err(UnknownScope(name)) => unknown.push(name),
            }
        }
        if unknown.is_empty() {
            Ok(Self(scopes))
        } else {
            Err(unknown)
        }
    }

    #[must_use]
    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    #[must_use]
    pub fn is_subset(&self, other: &ScopeSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Scopes in `self` that are missing from `other`.
    #[must_use]
    pub fn difference(&self, other: &ScopeSet) -> Vec<Scope> {
        self.0.difference(&other.0).copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        self.0.iter().copied()
    }

    /// Wire names, sorted.
    #[must_use]
    pub fn to_names(&self) -> Vec<String> {
        self.iter().map(|s| s.as_str().to_string()).collect()
    }

    /// Builds a set from stored wire names.
    ///
    /// # Errors
    ///
    /// Fails on the first unrecognised name.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, UnknownScope> {
        names.iter().map(|n| n.as_ref().parse::<Scope>()).collect()
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Scope; N]> for ScopeSet {
    fn from(scopes: [Scope; N]) -> Self {
        scopes.into_iter().collect()
    }
}

/// Space-joined, sorted.
impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, scope) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(scope.as_str())?;
        }
        Ok(())
    }
}
