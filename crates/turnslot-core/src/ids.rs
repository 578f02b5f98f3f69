//! Identifier and timestamp newtypes.
//!
//! All ids are 64-bit snowflake-style values handed out by the chat platform.
//! Ids increase over time, so a larger [`MessageId`] always belongs to a
//! message created later.

use std::fmt;

/// A chat platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub u64);

/// A surface (channel or thread) where messages are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u64);

/// A message inside a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u64);

/// Wall-clock time in unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Build a timestamp from whole unix seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Whole unix seconds, as used by the platform's time markup.
    pub fn as_secs(self) -> u64 {
        self.0 / 1000
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero.
    pub fn millis_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_seconds_truncate() {
        assert_eq!(Timestamp(1_999).as_secs(), 1);
        assert_eq!(Timestamp::from_secs(42).as_secs(), 42);
    }

    #[test]
    fn millis_since_saturates() {
        assert_eq!(Timestamp(5_000).millis_since(Timestamp(2_000)), 3_000);
        assert_eq!(Timestamp(1_000).millis_since(Timestamp(2_000)), 0);
    }
}
