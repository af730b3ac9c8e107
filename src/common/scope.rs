//! Scopes an application can request for its API key.
//!
//! The vocabulary is closed and mirrors the forum's `UserApiKeyScope` model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::BuildRequestError;

/// Every scope the forum accepts, in its canonical order.
pub const PERMITTED_SCOPES: [Scope; 9] = [
    Scope::Read,
    Scope::Write,
    Scope::MessageBus,
    Scope::Push,
    Scope::OneTimePassword,
    Scope::Notifications,
    Scope::SessionInfo,
    Scope::BookmarksCalendar,
    Scope::UserStatus,
];

/// A named permission granted to the issued API key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Read access
    Read,
    /// Write access
    Write,
    /// Message bus subscriptions
    MessageBus,
    /// Push notifications
    Push,
    /// One-time password login
    OneTimePassword,
    /// Notification listing
    Notifications,
    /// Current session info
    SessionInfo,
    /// Bookmark calendar feed
    BookmarksCalendar,
    /// User status updates
    UserStatus,
}

impl Scope {
    /// Returns the wire name of the scope.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Scope::Read => "read",
            Scope::Write => "write",
            Scope::MessageBus => "message_bus",
            Scope::Push => "push",
            Scope::OneTimePassword => "one_time_password",
            Scope::Notifications => "notifications",
            Scope::SessionInfo => "session_info",
            Scope::BookmarksCalendar => "bookmarks_calendar",
            Scope::UserStatus => "user_status",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = BuildRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PERMITTED_SCOPES
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| BuildRequestError::InvalidScope(s.to_string()))
    }
}

/// A non-empty, duplicate-free list of scopes.
///
/// Insertion order is kept so the encoded request is stable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ScopeSet {
    scopes: Vec<Scope>,
}

impl ScopeSet {
    /// Builds a set from scope values. An empty input yields the default set.
    #[must_use]
    pub fn new(scopes: impl IntoIterator<Item = Scope>) -> Self {
        let mut deduped = Vec::new();
        for scope in scopes {
            if !deduped.contains(&scope) {
                deduped.push(scope);
            }
        }
        if deduped.is_empty() {
            return Self::default();
        }
        Self { scopes: deduped }
    }

    /// Parses scope names. An empty input yields the default set.
    ///
    /// # Errors
    /// Returns [`BuildRequestError::InvalidScope`] for the first name that is
    /// not in [`PERMITTED_SCOPES`].
    pub fn parse<I, S>(names: I) -> Result<Self, BuildRequestError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let scopes = names
            .into_iter()
            .map(|name| name.as_ref().parse::<Scope>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(scopes))
    }

    /// Returns the scopes in request order.
    #[must_use]
    pub fn as_slice(&self) -> &[Scope] {
        &self.scopes
    }

    /// Returns true if the set contains `scope`.
    #[must_use]
    pub fn contains(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }

    /// Comma-joined wire form, e.g. `read,notifications`.
    #[must_use]
    pub fn to_param(&self) -> String {
        self.scopes
            .iter()
            .map(Scope::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for ScopeSet {
    fn default() -> Self {
        Self {
            scopes: vec![Scope::Read],
        }
    }
}

impl TryFrom<Vec<String>> for ScopeSet {
    type Error = BuildRequestError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::parse(names)
    }
}

impl From<ScopeSet> for Vec<String> {
    fn from(set: ScopeSet) -> Self {
        set.scopes.iter().map(ToString::to_string).collect()
    }
}
