use serde::{Deserialize, Serialize};

/// Order type for a routed order
///
/// A closed variant rather than a free-form tag: only these two
/// combinations with [`super::Side`] are representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Execute only at or better than the caller's limit price
    Limit,
    /// Execute against whatever eligible liquidity exists
    Market,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Limit => write!(f, "limit"),
            OrderType::Market => write!(f, "market"),
        }
    }
}
