//! Shared domain enumerations for cache operations and ordering.

use std::fmt;

/// Mutation kind handled by an updater.
///
/// The kind selects which cache store operation reconciles local state after
/// the remote mutation succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
    #[default]
    Any,
    Custom(String),
}

impl Operation {
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Any => "any",
            Operation::Custom(name) => name.as_str(),
        }
    }

    /// Past-tense verb used in user-facing outcome messages.
    pub fn past_tense(&self) -> String {
        match self {
            Operation::Create => "created".to_string(),
            Operation::Update | Operation::Any => "updated".to_string(),
            Operation::Delete => "deleted".to_string(),
            Operation::Custom(name) => format!("completed {name} on"),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    /// Only the literal `desc` selects descending order.
    pub fn parse(value: &str) -> Self {
        if value == "desc" {
            OrderDirection::Desc
        } else {
            OrderDirection::Asc
        }
    }
}
