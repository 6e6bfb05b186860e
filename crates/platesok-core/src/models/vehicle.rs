//! Wire models for vehicle registration records.
//!
//! These mirror the lookup service's JSON shapes field for field. The
//! session layer hands them to the display layer as-is; a payload that
//! does not match is rejected at the parsing boundary.

use serde::{Deserialize, Serialize};

/// Basic registration record returned by the simple lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleVehicleData {
    pub vehicle_id: String,
    pub license_plate: String,
    pub make: String,
    pub model: String,
    pub type_designation: String,
    pub fuel_type: String,
    pub color: String,
}

impl SimpleVehicleData {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.make, self.model)
    }
}

/// Full registration record returned by the detailed lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedVehicleData {
    pub vehicle_id: String,
    pub license_plate: String,
    pub make: String,
    pub model: String,
    pub type_designation: String,
    pub fuel_type: String,
    pub color: String,

    pub vin: String,
    pub first_registration_date_in_norway: String,
    pub registration_status: String,
    pub registration_date_on_current_owner: String,
    pub import_country: String,
    pub next_control_date: String,
    pub last_control_date: String,
    pub emissions_class: String,

    pub co2_emission: f64,
    pub fuel_consumption: f64,
    pub max_net_power: f64,
    pub engine_volume: f64,

    pub import_milage: i64,
    pub seat_count: i64,
    pub curb_weight: i64,
    pub minimum_curb_weight: i64,
    pub payload_capacity: i64,
    pub max_trailer_weight_with_brakes: i64,
    pub max_trailer_weight_without_brakes: i64,
    pub max_total_weight: i64,
    pub max_vertical_coupling_load: i64,
    pub max_gross_weight: i64,

    pub county: String,
    pub geographical_area: String,
    pub vehicle_type: String,
}
