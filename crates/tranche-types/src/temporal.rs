use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Token amount in minor units.
pub type Amount = u128;

/// Whole seconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Sentinel for "never set".
    pub const EPOCH: Timestamp = Timestamp(0);

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0))
    }

    pub fn saturating_add(self, delay: Duration) -> Self {
        Self(self.0.saturating_add(delay.as_secs()))
    }

    /// RFC 3339 rendering, `None` if out of chrono's range.
    pub fn to_rfc3339(&self) -> Option<String> {
        let secs = i64::try_from(self.0).ok()?;
        chrono::DateTime::from_timestamp(secs, 0).map(|dt| dt.to_rfc3339())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}
