//! Raw balance records produced by adapters.

use serde::{Deserialize, Serialize};

/// One asset line. At least two of `free`, `used`, `total` are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBalance {
    pub code: Option<String>,
    pub free: Option<String>,
    pub used: Option<String>,
    pub total: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBalances {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    pub assets: Vec<RawBalance>,
}
