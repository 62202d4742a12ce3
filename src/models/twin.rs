//! Twin payload types: properties, channels and the full structure sent on create.

use crate::constants::channels;
use serde::{Deserialize, Serialize};

/// Values published on a channel, keyed by value label
pub type ChannelValues = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Literal(String),
    Uri(String),
}

impl PropertyValue {
    pub fn as_str(&self) -> &str {
        match self {
            PropertyValue::Literal(value) | PropertyValue::Uri(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: PropertyValue,
}

impl Property {
    pub fn literal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: PropertyValue::Literal(value.into()),
        }
    }

    pub fn uri(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: PropertyValue::Uri(value.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lon: f64,
}

/// Declared value of a channel (label + data type)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelValueSpec {
    pub label: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub channel_id: String,
    pub properties: Vec<Property>,
    pub values: Vec<ChannelValueSpec>,
}

/// Everything the directory needs to create or replace a twin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinStructure {
    pub properties: Vec<Property>,
    pub location: Option<GeoLocation>,
    pub channels: Vec<ChannelSpec>,
}

impl TwinStructure {
    pub fn channel(&self, channel_id: &str) -> Option<&ChannelSpec> {
        self.channels.iter().find(|c| c.channel_id == channel_id)
    }

    pub fn has_property(&self, property: &Property) -> bool {
        self.properties.contains(property)
    }
}

/// Replace a set of property keys on one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMetadataUpdate {
    pub channel_id: String,
    pub properties_added: Vec<Property>,
    pub property_keys_deleted: Vec<String>,
}

/// The two data channels every vessel twin carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VesselChannel {
    Arrival,
    Departure,
}

impl VesselChannel {
    pub fn channel_id(&self) -> &'static str {
        match self {
            VesselChannel::Arrival => channels::ARRIVAL_ID,
            VesselChannel::Departure => channels::DEPARTURE_ID,
        }
    }

    pub fn value_label(&self) -> &'static str {
        match self {
            VesselChannel::Arrival => channels::ARRIVAL_VALUE_LABEL,
            VesselChannel::Departure => channels::DEPARTURE_VALUE_LABEL,
        }
    }

    /// Single-value payload for this channel
    pub fn values(&self, occurred: bool) -> ChannelValues {
        let mut values = ChannelValues::new();
        values.insert(self.value_label().to_string(), serde_json::Value::Bool(occurred));
        values
    }
}

impl std::fmt::Display for VesselChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.channel_id())
    }
}
