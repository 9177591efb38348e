use serde::{Deserialize, Serialize};

/// Unique identifier for an instrument
///
/// This provides a stable reference to an instrument that can be stored
/// in plans and receipts and used as map keys. Instrument specifications
/// (contract size, expiry, tick size) live with the venues that list them;
/// the router only needs the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId(pub String);

impl InstrumentId {
    /// Create a new instrument ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for InstrumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instrument_id() {
        let id = InstrumentId::new("BTC-PERP");
        assert_eq!(id.as_str(), "BTC-PERP");
        assert_eq!(format!("{}", id), "BTC-PERP");
    }
}
