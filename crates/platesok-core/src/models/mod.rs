//! Wire models returned by the lookup service.

pub mod history;
pub mod vehicle;

pub use history::SearchHistoryItem;
pub use vehicle::{DetailedVehicleData, SimpleVehicleData};
