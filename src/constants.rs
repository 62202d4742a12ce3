//! # Replay Constants
//!
//! Property keys, ontology URIs, channel identifiers and default windows that
//! define the shape of vessel twins and the pacing of the replay.

/// Property keys shared by every twin
pub mod property_keys {
    pub const LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const CREATED_BY: &str = "https://data.iotics.com/app#createdBy";
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const HOST_ALLOW_LIST: &str = "http://data.iotics.com/public#hostAllowList";
    pub const HOST_METADATA_ALLOW_LIST: &str = "http://data.iotics.com/public#hostMetadataAllowList";
}

/// Property values shared by every twin
pub mod property_values {
    pub const CREATED_BY_NAME: &str = "Vessel Movement Connector";
    pub const ALLOW_ALL: &str = "http://data.iotics.com/public#all";
    /// Placeholder for attributes missing from the source data
    pub const UNKNOWN: &str = "Unknown";
}

/// Ontology URIs describing vessels and voyages
pub mod ontology {
    pub const SHIP: &str = "https://www.wikidata.org/wiki/Q11446";
    pub const PREFIX: &str = "https://w3id.org/SeaChange/PIP#";

    pub const SHIP_NAME: &str = "ShipName";
    pub const ABBREVIATION: &str = "Abbreviation";
    pub const VESSEL_TYPE: &str = "VesselType";
    pub const CO_REFERENCE: &str = "CoReference";
    pub const LOA: &str = "LOA";
    pub const BEAM: &str = "Beam";
    pub const DRAUGHT: &str = "Draught";
    pub const GRT: &str = "GRT";
    pub const NET_TONNAGE: &str = "NetTonnage";
    pub const PORT_OF_REGISTRATION: &str = "PortOfRegistration";
    pub const DATE_OF_REGISTRATION: &str = "DateOfRegistration";
    pub const NATIONALITY: &str = "Nationality";
    pub const DEAD_WEIGHT: &str = "DeadWeight";
    pub const LRN: &str = "LRN";

    pub const ETA: &str = "ETA";
    pub const BERTH: &str = "Berth";
    pub const PORT_OF_ORIGIN_CODE: &str = "PortOfOriginCode";
    pub const PORT_OF_ORIGIN_NAME: &str = "PortOfOriginName";
    pub const LOCATION_FROM: &str = "LocationFrom";
    pub const ETD: &str = "ETD";
    pub const PORT_OF_DESTINATION_CODE: &str = "PortOfDestinationCode";
    pub const PORT_OF_DESTINATION_NAME: &str = "PortOfDestinationName";
    pub const LOCATION_TO: &str = "LocationTo";

    /// Full property key for an ontology suffix
    pub fn key(suffix: &str) -> String {
        format!("{PREFIX}{suffix}")
    }
}

/// Channel identifiers and value labels
pub mod channels {
    pub const ARRIVAL_ID: &str = "arrival";
    pub const DEPARTURE_ID: &str = "departure";
    pub const ARRIVAL_VALUE_LABEL: &str = "arrived";
    pub const DEPARTURE_VALUE_LABEL: &str = "departed";
    pub const VALUE_DATA_TYPE: &str = "boolean";
}

/// Source CSV parsing
pub mod dataset_fields {
    pub const DEFAULT_DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M";
}

/// Port coordinates used as the twin location
pub const PORT_LATITUDE: f64 = 50.7951;
pub const PORT_LONGITUDE: f64 = -1.1065;

/// Default admission and retention windows, in days
pub const DEFAULT_PAST_WINDOW_DAYS: i64 = 3;
pub const DEFAULT_FUTURE_WINDOW_DAYS: i64 = 3;
pub const DEFAULT_RETENTION_WINDOW_DAYS: i64 = 3;

/// Upper bound for any configured day count (windows and explicit shifts)
pub const MAX_CONFIGURED_DAYS: i64 = 36_500;

/// Default retry policy
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_BACKOFF_INCREMENT_MS: u64 = 2_000;

/// Token refresh happens once this fraction of its lifetime has elapsed
pub const DEFAULT_TOKEN_REFRESH_FRACTION: f64 = 0.75;
pub const DEFAULT_TOKEN_DURATION_SECONDS: u64 = 60;

/// Calls the in-memory directory keeps for inspection
pub const DEFAULT_OPERATION_HISTORY: usize = 10_000;
