use serde::{Deserialize, Serialize};

/// Strongly typed device row id.
///
/// Devices are identified internally by an opaque integer; the natural key
/// used for reconciliation is the management IP, never this id.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct DeviceId(pub i64);

impl DeviceId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for DeviceId {
    fn from(value: i64) -> Self {
        DeviceId(value)
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
