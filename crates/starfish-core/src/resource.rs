use crate::error::PayloadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Provisioning resource kinds fetched per call manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Station,
    #[serde(rename = "huntgroup")]
    HuntGroup,
    #[serde(rename = "pickupgroup")]
    PickupGroup,
}

impl ResourceType {
    pub const ALL: [ResourceType; 3] = [
        ResourceType::Station,
        ResourceType::HuntGroup,
        ResourceType::PickupGroup,
    ];

    /// Path segment used by the provisioning API (`/resource/{segment}/{id}`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Station => "station",
            ResourceType::HuntGroup => "huntgroup",
            ResourceType::PickupGroup => "pickupgroup",
        }
    }

    /// Human-readable label used in single-type sync summaries.
    pub fn label(&self) -> &'static str {
        match self {
            ResourceType::Station => "Station",
            ResourceType::HuntGroup => "Hunt group",
            ResourceType::PickupGroup => "Pickup group",
        }
    }

    /// Compact label used in the combined summary.
    pub fn short_label(&self) -> &'static str {
        match self {
            ResourceType::Station => "Station",
            ResourceType::HuntGroup => "HuntGroup",
            ResourceType::PickupGroup => "PickupGroup",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "station" => Ok(ResourceType::Station),
            "huntgroup" | "hunt_group" | "hunt-group" => Ok(ResourceType::HuntGroup),
            "pickupgroup" | "pickup_group" | "pickup-group" => Ok(ResourceType::PickupGroup),
            _ => Err(PayloadError::UnknownResourceType(s.to_string())),
        }
    }
}
