//! Admission decisions.

/// Outcome of evaluating one request against its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Within quota. `current` includes the request being admitted.
    Admit { current: u32, limit: u32, reset_at: i64 },

    /// Over quota.
    Reject {
        limit: u32,
        reset_at: i64,
        retry_after: u64,
    },

    /// The store could not be consulted; admitted without counting.
    FailOpen { limit: u32, reset_at: i64 },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Decision::Reject { .. })
    }

    pub fn limit(&self) -> u32 {
        match self {
            Decision::Admit { limit, .. }
            | Decision::Reject { limit, .. }
            | Decision::FailOpen { limit, .. } => *limit,
        }
    }

    pub fn remaining(&self) -> u32 {
        match self {
            Decision::Admit { current, limit, .. } => limit.saturating_sub(*current),
            Decision::Reject { .. } => 0,
            Decision::FailOpen { limit, .. } => *limit,
        }
    }

    /// Unix seconds at which the window fully clears.
    pub fn reset_at(&self) -> i64 {
        match self {
            Decision::Admit { reset_at, .. }
            | Decision::Reject { reset_at, .. }
            | Decision::FailOpen { reset_at, .. } => *reset_at,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Decision::Reject { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Short outcome name for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Decision::Admit { .. } => "admitted",
            Decision::Reject { .. } => "rejected",
            Decision::FailOpen { .. } => "fail_open",
        }
    }

    pub fn headers(&self) -> QuotaHeaders {
        QuotaHeaders {
            limit: self.limit(),
            remaining: self.remaining(),
            reset: self.reset_at(),
            retry_after: self.retry_after(),
        }
    }
}

/// Header values describing the caller's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaHeaders {
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64,
    pub retry_after: Option<u64>,
}
