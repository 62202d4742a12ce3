use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MovementRecord is one voyage of a vessel through the port
/// Produced by the dataset loader, immutable once parsed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub ship_name: String,
    /// Estimated time of arrival
    pub eta: DateTime<Utc>,
    /// Actual time of arrival
    pub ata: DateTime<Utc>,
    /// Estimated time of departure
    pub etd: DateTime<Utc>,
    /// Actual time of departure
    pub atd: DateTime<Utc>,
    pub berth: Option<String>,
    pub port_of_origin_code: Option<String>,
    pub port_of_origin_name: Option<String>,
    pub location_from: Option<String>,
    pub port_of_destination_code: Option<String>,
    pub port_of_destination_name: Option<String>,
    pub location_to: Option<String>,
}

impl MovementRecord {
    /// Key used to look the vessel up in the entity registry
    pub fn entity_key(&self) -> &str {
        &self.ship_name
    }

    /// True when the actual departure is recorded before the actual arrival
    pub fn departs_before_arrival(&self) -> bool {
        self.atd < self.ata
    }
}

/// VesselInfo is the static reference data for a vessel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VesselInfo {
    pub ship_name: String,
    pub abbreviation: Option<String>,
    pub vessel_type: Option<String>,
    pub co_reference: Option<String>,
    pub loa: Option<String>,
    pub beam: Option<String>,
    pub draught: Option<String>,
    pub grt: Option<String>,
    pub net_tonnage: Option<String>,
    pub port_of_registration: Option<String>,
    pub date_of_registration: Option<String>,
    pub nationality: Option<String>,
    pub dead_weight: Option<String>,
    pub lrn: Option<String>,
}

impl VesselInfo {
    /// Case-insensitive match against a ship name
    pub fn matches(&self, ship_name: &str) -> bool {
        self.ship_name.eq_ignore_ascii_case(ship_name.trim())
    }
}
