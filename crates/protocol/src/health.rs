use serde::{Deserialize, Serialize};
use std::time::SystemTime;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}

impl HealthStatus {
    pub fn ok_at(now: SystemTime) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: humantime::format_rfc3339_millis(now).to_string(),
        }
    }
}
