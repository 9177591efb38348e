use serde::{Deserialize, Serialize};

/// Unique identifier for a liquidity venue (slab)
///
/// Each venue is an isolated order book with its own price, depth and fee
/// schedule. `VenueId` derives `Ord` because the allocation planner breaks
/// price ties by venue id ascending, for determinism.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VenueId(pub String);

impl VenueId {
    /// Create a new venue ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VenueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VenueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_id_ordering() {
        let a = VenueId::new("alpha");
        let b = VenueId::new("beta");
        assert!(a < b);
    }
}
