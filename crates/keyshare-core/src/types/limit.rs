//! Capacity limits for devices and concurrent sessions.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A positive upper bound on simultaneous occupancy.
///
/// Used for both a user's device limit and an account's
/// concurrent-session limit. A limit is reached once the current
/// occupancy is equal to it; admitting one more would exceed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CapacityLimit(u32);

impl CapacityLimit {
    /// Create a limit, rejecting zero.
    pub fn new(max: u32) -> Result<Self, AppError> {
        if max == 0 {
            return Err(AppError::validation("Capacity limit must be at least 1"));
        }
        Ok(Self(max))
    }

    /// Interpret a stored value, clamping legacy zeroes up to one.
    pub fn from_stored(max: u32) -> Self {
        Self(max.max(1))
    }

    /// Check whether the given occupancy leaves no room for another slot.
    pub fn is_reached_by(&self, occupancy: u32) -> bool {
        occupancy >= self.0
    }

    /// Slots still free at the given occupancy.
    pub fn remaining(&self, occupancy: u32) -> u32 {
        self.0.saturating_sub(occupancy)
    }

    /// The numeric limit.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for CapacityLimit {
    type Error = AppError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CapacityLimit> for u32 {
    fn from(limit: CapacityLimit) -> u32 {
        limit.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_reached() {
        let limit = CapacityLimit::new(3).unwrap();
        assert!(!limit.is_reached_by(2));
        assert!(limit.is_reached_by(3));
        assert!(limit.is_reached_by(4));
        assert_eq!(limit.remaining(1), 2);
        assert_eq!(limit.remaining(5), 0);
    }

    #[test]
    fn test_zero_rejected() {
        assert!(CapacityLimit::new(0).is_err());
        assert_eq!(CapacityLimit::from_stored(0).get(), 1);
    }

    #[test]
    fn test_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<CapacityLimit>("0").is_err());
        let limit: CapacityLimit = serde_json::from_str("2").unwrap();
        assert_eq!(limit.get(), 2);
    }
}
