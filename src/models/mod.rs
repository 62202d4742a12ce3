pub mod entity;
pub mod event;
pub mod movement;
pub mod twin;

// Re-export core models for easy access
pub use entity::{identity_key_name, EntityHandle, EntityId};
pub use event::{EventKey, EventKind, ScheduleOutcome, ScheduledEvent};
pub use movement::{MovementRecord, VesselInfo};
pub use twin::{
    ChannelMetadataUpdate, ChannelSpec, ChannelValueSpec, ChannelValues, GeoLocation, Property,
    PropertyValue, TwinStructure, VesselChannel,
};
