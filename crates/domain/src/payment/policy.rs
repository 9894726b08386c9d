//! Payment decline policy.

use common::Money;

/// Decides whether a payment attempt is approved.
///
/// Parsed from `approve-all`, `decline-all` or `decline-above:<cents>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeclinePolicy {
    /// Every payment succeeds.
    #[default]
    ApproveAll,
    /// Every payment is declined.
    DeclineAll,
    /// Payments strictly above the limit are declined.
    DeclineAbove(Money),
}

impl DeclinePolicy {
    /// Returns true if a payment of `amount` is approved.
    pub fn approves(&self, amount: Money) -> bool {
        match self {
            DeclinePolicy::ApproveAll => true,
            DeclinePolicy::DeclineAll => false,
            DeclinePolicy::DeclineAbove(limit) => amount <= *limit,
        }
    }
}

impl std::fmt::Display for DeclinePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclinePolicy::ApproveAll => f.write_str("approve-all"),
            DeclinePolicy::DeclineAll => f.write_str("decline-all"),
            DeclinePolicy::DeclineAbove(limit) => write!(f, "decline-above:{}", limit.cents()),
        }
    }
}

impl std::str::FromStr for DeclinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "approve-all" => Ok(DeclinePolicy::ApproveAll),
            "decline-all" => Ok(DeclinePolicy::DeclineAll),
            other => {
                let cents = other
                    .strip_prefix("decline-above:")
                    .ok_or_else(|| format!("unknown decline policy: {other}"))?;
                let cents: i64 = cents
                    .trim()
                    .parse()
                    .map_err(|e| format!("invalid decline limit {cents:?}: {e}"))?;
                Ok(DeclinePolicy::DeclineAbove(Money::from_cents(cents)))
            }
        }
    }
}
