//! # Vessel Twin Builder
//!
//! Assembles the payloads sent to the directory for a vessel: the full
//! [`TwinStructure`] on creation, and the per-channel [`ChannelMetadataUpdate`]s
//! applied when a known vessel starts a new voyage.
//!
//! Every twin carries the ship type, a label, the ship name, the thirteen
//! reference-data attributes, the created-by marker and host allow-lists. The
//! `arrival` channel describes the inbound leg (shifted ETA, berth, origin) and
//! the `departure` channel the outbound leg (shifted ETD, destination). Missing
//! values are published as `"Unknown"`.

use crate::constants::{channels, ontology, property_keys, property_values};
use crate::models::{
    ChannelMetadataUpdate, ChannelSpec, ChannelValueSpec, GeoLocation, MovementRecord, Property,
    TwinStructure, VesselChannel, VesselInfo,
};
use crate::time_shift::TimeShift;
use chrono::{DateTime, Utc};

const ARRIVAL_LABEL: &str = "Arrival";
const DEPARTURE_LABEL: &str = "Departure";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct VesselTwinBuilder {
    time_shift: TimeShift,
    location: GeoLocation,
}

impl VesselTwinBuilder {
    pub fn new(time_shift: TimeShift, location: GeoLocation) -> Self {
        Self {
            time_shift,
            location,
        }
    }

    pub fn time_shift(&self) -> &TimeShift {
        &self.time_shift
    }

    /// Twin structure for a vessel seen for the first time
    pub fn build(&self, record: &MovementRecord, info: Option<&VesselInfo>) -> TwinStructure {
        TwinStructure {
            properties: self.twin_properties(&record.ship_name, info),
            location: Some(self.location),
            channels: vec![
                self.channel_spec(VesselChannel::Arrival, self.arrival_properties(record)),
                self.channel_spec(VesselChannel::Departure, self.departure_properties(record)),
            ],
        }
    }

    pub fn twin_properties(&self, ship_name: &str, info: Option<&VesselInfo>) -> Vec<Property> {
        let default_info = VesselInfo::default();
        let info = info.unwrap_or(&default_info);

        let mut properties = vec![
            Property::uri(property_keys::TYPE, ontology::SHIP),
            Property::literal(property_keys::LABEL, ship_name),
            Property::literal(ontology::key(ontology::SHIP_NAME), ship_name),
        ];

        let attributes = [
            (ontology::ABBREVIATION, &info.abbreviation),
            (ontology::VESSEL_TYPE, &info.vessel_type),
            (ontology::CO_REFERENCE, &info.co_reference),
            (ontology::LOA, &info.loa),
            (ontology::BEAM, &info.beam),
            (ontology::DRAUGHT, &info.draught),
            (ontology::GRT, &info.grt),
            (ontology::NET_TONNAGE, &info.net_tonnage),
            (ontology::PORT_OF_REGISTRATION, &info.port_of_registration),
            (ontology::DATE_OF_REGISTRATION, &info.date_of_registration),
            (ontology::NATIONALITY, &info.nationality),
            (ontology::DEAD_WEIGHT, &info.dead_weight),
            (ontology::LRN, &info.lrn),
        ];
        properties.extend(
            attributes
                .into_iter()
                .map(|(suffix, value)| attribute(suffix, value.as_deref())),
        );

        properties.extend([
            Property::literal(property_keys::CREATED_BY, property_values::CREATED_BY_NAME),
            Property::uri(property_keys::HOST_ALLOW_LIST, property_values::ALLOW_ALL),
            Property::uri(
                property_keys::HOST_METADATA_ALLOW_LIST,
                property_values::ALLOW_ALL,
            ),
        ]);
        properties
    }

    pub fn arrival_properties(&self, record: &MovementRecord) -> Vec<Property> {
        let mut properties = vec![Property::literal(property_keys::LABEL, ARRIVAL_LABEL)];
        properties.extend(self.arrival_voyage_properties(record));
        properties
    }

    pub fn departure_properties(&self, record: &MovementRecord) -> Vec<Property> {
        let mut properties = vec![Property::literal(property_keys::LABEL, DEPARTURE_LABEL)];
        properties.extend(self.departure_voyage_properties(record));
        properties
    }

    /// Replace the inbound voyage properties on the `arrival` channel
    pub fn arrival_update(&self, record: &MovementRecord) -> ChannelMetadataUpdate {
        voyage_update(VesselChannel::Arrival, self.arrival_voyage_properties(record))
    }

    /// Replace the outbound voyage properties on the `departure` channel
    pub fn departure_update(&self, record: &MovementRecord) -> ChannelMetadataUpdate {
        voyage_update(
            VesselChannel::Departure,
            self.departure_voyage_properties(record),
        )
    }

    /// Properties shared by every twin this engine creates
    pub fn search_criteria() -> Vec<Property> {
        vec![
            Property::uri(property_keys::TYPE, ontology::SHIP),
            Property::literal(property_keys::CREATED_BY, property_values::CREATED_BY_NAME),
        ]
    }

    fn arrival_voyage_properties(&self, record: &MovementRecord) -> Vec<Property> {
        vec![
            Property::literal(
                ontology::key(ontology::ETA),
                self.format_shifted(record.eta),
            ),
            attribute(ontology::BERTH, record.berth.as_deref()),
            attribute(
                ontology::PORT_OF_ORIGIN_CODE,
                record.port_of_origin_code.as_deref(),
            ),
            attribute(
                ontology::PORT_OF_ORIGIN_NAME,
                record.port_of_origin_name.as_deref(),
            ),
            attribute(ontology::LOCATION_FROM, record.location_from.as_deref()),
        ]
    }

    fn departure_voyage_properties(&self, record: &MovementRecord) -> Vec<Property> {
        vec![
            Property::literal(
                ontology::key(ontology::ETD),
                self.format_shifted(record.etd),
            ),
            attribute(
                ontology::PORT_OF_DESTINATION_CODE,
                record.port_of_destination_code.as_deref(),
            ),
            attribute(
                ontology::PORT_OF_DESTINATION_NAME,
                record.port_of_destination_name.as_deref(),
            ),
            attribute(ontology::LOCATION_TO, record.location_to.as_deref()),
        ]
    }

    fn channel_spec(&self, channel: VesselChannel, properties: Vec<Property>) -> ChannelSpec {
        ChannelSpec {
            channel_id: channel.channel_id().to_string(),
            properties,
            values: vec![ChannelValueSpec {
                label: channel.value_label().to_string(),
                data_type: channels::VALUE_DATA_TYPE.to_string(),
            }],
        }
    }

    fn format_shifted(&self, timestamp: DateTime<Utc>) -> String {
        self.time_shift
            .shift(timestamp)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }
}

fn attribute(suffix: &str, value: Option<&str>) -> Property {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(property_values::UNKNOWN);
    Property::literal(ontology::key(suffix), value)
}

fn voyage_update(channel: VesselChannel, properties: Vec<Property>) -> ChannelMetadataUpdate {
    ChannelMetadataUpdate {
        channel_id: channel.channel_id().to_string(),
        property_keys_deleted: properties.iter().map(|p| p.key.clone()).collect(),
        properties_added: properties,
    }
}
