use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Soft-delete state shared by users, movies and ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    Active,
    Inactive {
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
        by: Option<Uuid>,
    },
}

impl Lifecycle {
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }

    pub fn deactivated_at(&self) -> Option<OffsetDateTime> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Inactive { at, .. } => Some(*at),
        }
    }

    pub fn deactivated_by(&self) -> Option<Uuid> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Inactive { by, .. } => *by,
        }
    }

    /// Rebuilds the state from the flag + metadata columns used by storage.
    /// A missing timestamp on an inactive row falls back to `fallback_at`.
    pub fn from_columns(
        is_active: bool,
        deactivated_at: Option<OffsetDateTime>,
        deactivated_by: Option<Uuid>,
        fallback_at: OffsetDateTime,
    ) -> Self {
        if is_active {
            Lifecycle::Active
        } else {
            Lifecycle::Inactive {
                at: deactivated_at.unwrap_or(fallback_at),
                by: deactivated_by,
            }
        }
    }
}
