//! # Movement Dataset
//!
//! Loads the vessel-movement schedule and the vessel reference data from CSV.
//! Rows are kept as read and only turned into [`MovementRecord`]s while
//! iterating, so a malformed timestamp surfaces as a [`ReplayError::DataError`]
//! for that record rather than failing the whole load. Iteration can be
//! restarted from the first record at any time.
//!
//! The schedule is expected to be sorted by arrival time; this is not checked.

use crate::config::DatasetConfig;
use crate::error::{ReplayError, ReplayResult};
use crate::models::{MovementRecord, VesselInfo};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
struct RawMovementRow {
    #[serde(rename = "Ship Name")]
    ship_name: Option<String>,
    #[serde(rename = "ETA")]
    eta: Option<String>,
    #[serde(rename = "ATA")]
    ata: Option<String>,
    #[serde(rename = "ETD")]
    etd: Option<String>,
    #[serde(rename = "ATD")]
    atd: Option<String>,
    #[serde(rename = "Berth")]
    berth: Option<String>,
    #[serde(rename = "Port Origin Code")]
    port_of_origin_code: Option<String>,
    #[serde(rename = "Port Origin Name")]
    port_of_origin_name: Option<String>,
    #[serde(rename = "PiP area location from")]
    location_from: Option<String>,
    #[serde(rename = "Port Destination Code")]
    port_of_destination_code: Option<String>,
    #[serde(rename = "Port Destination Name")]
    port_of_destination_name: Option<String>,
    #[serde(rename = "PiP area location to")]
    location_to: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawVesselRow {
    #[serde(rename = "Ship Name")]
    ship_name: Option<String>,
    #[serde(rename = "Abbreviation")]
    abbreviation: Option<String>,
    #[serde(rename = "Type")]
    vessel_type: Option<String>,
    #[serde(rename = "Co. Reference")]
    co_reference: Option<String>,
    #[serde(rename = "LOA")]
    loa: Option<String>,
    #[serde(rename = "Beam")]
    beam: Option<String>,
    #[serde(rename = "Draught")]
    draught: Option<String>,
    #[serde(rename = "Grt")]
    grt: Option<String>,
    #[serde(rename = "Net Tonnag")]
    net_tonnage: Option<String>,
    #[serde(rename = "Port Of Registration")]
    port_of_registration: Option<String>,
    #[serde(rename = "Date of Registration")]
    date_of_registration: Option<String>,
    #[serde(rename = "Nationality")]
    nationality: Option<String>,
    #[serde(rename = "Dead Weight")]
    dead_weight: Option<String>,
    #[serde(rename = "LRN")]
    lrn: Option<String>,
}

impl RawVesselRow {
    fn into_info(self) -> Option<VesselInfo> {
        Some(VesselInfo {
            ship_name: present(self.ship_name)?,
            abbreviation: present(self.abbreviation),
            vessel_type: present(self.vessel_type),
            co_reference: present(self.co_reference),
            loa: present(self.loa),
            beam: present(self.beam),
            draught: present(self.draught),
            grt: present(self.grt),
            net_tonnage: present(self.net_tonnage),
            port_of_registration: present(self.port_of_registration),
            date_of_registration: present(self.date_of_registration),
            nationality: present(self.nationality),
            dead_weight: present(self.dead_weight),
            lrn: present(self.lrn),
        })
    }
}

#[derive(Debug, Clone)]
enum MovementRow {
    Raw(RawMovementRow),
    Parsed(MovementRecord),
}

#[derive(Debug, Clone)]
pub struct MovementDataset {
    rows: Vec<MovementRow>,
    vessels: Vec<VesselInfo>,
    datetime_format: String,
}

impl MovementDataset {
    /// Dataset made of already-parsed records
    pub fn new(records: Vec<MovementRecord>, vessels: Vec<VesselInfo>) -> Self {
        Self {
            rows: records.into_iter().map(MovementRow::Parsed).collect(),
            vessels,
            datetime_format: crate::constants::dataset_fields::DEFAULT_DATETIME_FORMAT.to_string(),
        }
    }

    /// Load both CSV files named in the dataset configuration
    pub fn load(config: &DatasetConfig) -> ReplayResult<Self> {
        let movement_path = config.vessel_movement_path.as_deref().ok_or_else(|| {
            ReplayError::Dataset("dataset.vessel_movement_path is not set".to_string())
        })?;
        let info_path = config.vessel_info_path.as_deref().ok_or_else(|| {
            ReplayError::Dataset("dataset.vessel_info_path is not set".to_string())
        })?;

        let dataset = Self::from_readers(
            open(movement_path)?,
            open(info_path)?,
            &config.datetime_format,
        )?;

        info!(
            movements = dataset.len(),
            vessels = dataset.vessels.len(),
            movement_path = %movement_path.display(),
            info_path = %info_path.display(),
            "📂 Loaded vessel movement dataset"
        );
        Ok(dataset)
    }

    pub fn from_readers<M: Read, V: Read>(
        movements: M,
        vessels: V,
        datetime_format: &str,
    ) -> ReplayResult<Self> {
        let rows = reader(movements)
            .deserialize::<RawMovementRow>()
            .map(|row| row.map(MovementRow::Raw))
            .collect::<Result<Vec<_>, _>>()?;

        let vessels = reader(vessels)
            .deserialize::<RawVesselRow>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(RawVesselRow::into_info)
            .collect();

        Ok(Self {
            rows,
            vessels,
            datetime_format: datetime_format.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Records in file order; each call starts again from the first one.
    ///
    /// Record numbers in [`ReplayError::DataError`] are 1-based.
    pub fn movements(&self) -> impl Iterator<Item = ReplayResult<MovementRecord>> + Send + '_ {
        self.rows.iter().enumerate().map(|(index, row)| match row {
            MovementRow::Parsed(record) => Ok(record.clone()),
            MovementRow::Raw(raw) => parse_movement(raw, index + 1, &self.datetime_format),
        })
    }

    /// Reference data for a ship, matched case-insensitively
    pub fn vessel_info(&self, ship_name: &str) -> Option<&VesselInfo> {
        self.vessels.iter().find(|v| v.matches(ship_name))
    }

    pub fn vessels(&self) -> &[VesselInfo] {
        &self.vessels
    }
}

fn open(path: &Path) -> ReplayResult<File> {
    File::open(path)
        .map_err(|e| ReplayError::Dataset(format!("cannot open {}: {e}", path.display())))
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source)
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_movement(raw: &RawMovementRow, record: usize, format: &str) -> ReplayResult<MovementRecord> {
    let ship_name = present(raw.ship_name.clone()).ok_or_else(|| ReplayError::DataError {
        record,
        reason: "missing Ship Name".to_string(),
    })?;

    Ok(MovementRecord {
        ship_name,
        eta: parse_timestamp(&raw.eta, "ETA", record, format)?,
        ata: parse_timestamp(&raw.ata, "ATA", record, format)?,
        etd: parse_timestamp(&raw.etd, "ETD", record, format)?,
        atd: parse_timestamp(&raw.atd, "ATD", record, format)?,
        berth: present(raw.berth.clone()),
        port_of_origin_code: present(raw.port_of_origin_code.clone()),
        port_of_origin_name: present(raw.port_of_origin_name.clone()),
        location_from: present(raw.location_from.clone()),
        port_of_destination_code: present(raw.port_of_destination_code.clone()),
        port_of_destination_name: present(raw.port_of_destination_name.clone()),
        location_to: present(raw.location_to.clone()),
    })
}

fn parse_timestamp(
    value: &Option<String>,
    field: &str,
    record: usize,
    format: &str,
) -> ReplayResult<DateTime<Utc>> {
    let value = value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ReplayError::DataError {
            record,
            reason: format!("missing {field}"),
        })?;

    NaiveDateTime::parse_from_str(value, format)
        .map(|naive| naive.and_utc())
        .map_err(|e| ReplayError::DataError {
            record,
            reason: format!("invalid {field} '{value}': {e}"),
        })
}
