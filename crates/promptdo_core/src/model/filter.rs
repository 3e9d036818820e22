//! List view filter.

use crate::model::todo::Todo;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Which todos the list view shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TodoFilter {
    /// Every todo regardless of completion.
    #[default]
    All,
    /// Todos that are not completed.
    Active,
    /// Completed todos only.
    Completed,
}

impl TodoFilter {
    /// Lowercase name accepted by the `--filter` flag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Returns whether `todo` is visible under this filter.
    pub fn matches(self, todo: &Todo) -> bool {
        match self {
            Self::All => true,
            Self::Active => todo.is_active(),
            Self::Completed => todo.completed,
        }
    }
}

impl Display for TodoFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown filter name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFilterError(pub String);

impl Display for ParseFilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unsupported filter `{}`; expected all|active|completed",
            self.0
        )
    }
}

impl Error for ParseFilterError {}

impl FromStr for TodoFilter {
    type Err = ParseFilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(ParseFilterError(other.to_string())),
        }
    }
}
