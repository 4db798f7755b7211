use serde::Deserialize;

pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }.clamped()
    }

    /// Builds a page from optional query parameters, falling back to defaults.
    pub fn from_query(limit: Option<i64>, offset: Option<i64>) -> Self {
        let default = Self::default();
        Self::new(limit.unwrap_or(default.limit), offset.unwrap_or(default.offset))
    }

    /// Keeps limit in 1..=MAX_LIMIT and offset non-negative.
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.clamp(1, MAX_LIMIT),
            offset: self.offset.max(0),
        }
    }
}

/// `?limit=&offset=` for list endpoints without other filters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> Pagination {
        Pagination::from_query(self.limit, self.offset)
    }
}
