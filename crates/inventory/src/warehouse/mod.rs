//! Warehouses, zones and bin locations.
//!
//! Reference data only: stock operations read it to validate and resolve
//! locations but never change it.

mod registry;

pub use registry::WarehouseRegistry;

use chrono::{DateTime, Utc};
use common::{LocationId, WarehouseId, ZoneId};
use serde::{Deserialize, Serialize};

use crate::error::InventoryError;

/// Zone created with every warehouse.
pub const DEFAULT_ZONE_NAME: &str = "STAGING";

/// Location created with every warehouse, used when an operation names none.
pub const DEFAULT_LOCATION_CODE: &str = "RECEIVING";

/// Kind of facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarehouseType {
    #[default]
    Distribution,
    Fulfillment,
    Retail,
    Returns,
    ThirdParty,
}

impl WarehouseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarehouseType::Distribution => "DISTRIBUTION",
            WarehouseType::Fulfillment => "FULFILLMENT",
            WarehouseType::Retail => "RETAIL",
            WarehouseType::Returns => "RETURNS",
            WarehouseType::ThirdParty => "THIRD_PARTY",
        }
    }
}

impl std::fmt::Display for WarehouseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WarehouseType {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DISTRIBUTION" => Ok(WarehouseType::Distribution),
            "FULFILLMENT" => Ok(WarehouseType::Fulfillment),
            "RETAIL" => Ok(WarehouseType::Retail),
            "RETURNS" => Ok(WarehouseType::Returns),
            "THIRD_PARTY" => Ok(WarehouseType::ThirdParty),
            other => Err(InventoryError::Validation(format!(
                "unknown warehouse type: {other}"
            ))),
        }
    }
}

/// Postal address of a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    pub(crate) fn validate(&self) -> Result<(), InventoryError> {
        for (field, value) in [
            ("line1", &self.line1),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ] {
            if value.trim().is_empty() {
                return Err(InventoryError::Validation(format!(
                    "address.{field} is required"
                )));
            }
        }
        Ok(())
    }
}

/// Physical limits of a zone or location. Unset limits are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<i64>,
}

impl Capacity {
    /// Capacity limited only by unit count.
    pub fn items(max_items: i64) -> Self {
        Self {
            max_items: Some(max_items),
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), InventoryError> {
        let positive = |v: Option<f64>| v.is_none_or(|v| v.is_finite() && v > 0.0);
        if !positive(self.max_weight) || !positive(self.max_volume) {
            return Err(InventoryError::Validation(
                "capacity limits must be positive".to_string(),
            ));
        }
        if self.max_items.is_some_and(|n| n <= 0) {
            return Err(InventoryError::Validation(
                "capacity.maxItems must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    /// Unique, stored upper-case.
    pub code: String,
    #[serde(rename = "type")]
    pub warehouse_type: WarehouseType,
    pub address: Address,
    pub is_active: bool,
    pub default_location_id: LocationId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: ZoneId,
    pub warehouse_id: WarehouseId,
    pub name: String,
    #[serde(default)]
    pub capacity: Capacity,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: LocationId,
    pub warehouse_id: WarehouseId,
    pub zone_id: ZoneId,
    pub code: String,
    #[serde(default)]
    pub capacity: Capacity,
    pub created_at: DateTime<Utc>,
}

/// A newly registered warehouse together with its default zone and location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredWarehouse {
    pub warehouse: Warehouse,
    pub zone: Zone,
    pub location: Location,
}

/// Request to register a warehouse.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWarehouse {
    pub name: String,
    pub code: String,
    #[serde(rename = "type", default)]
    pub warehouse_type: WarehouseType,
    pub address: Address,
}

impl NewWarehouse {
    pub fn new(name: impl Into<String>, code: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            warehouse_type: WarehouseType::default(),
            address,
        }
    }

    pub fn with_type(mut self, warehouse_type: WarehouseType) -> Self {
        self.warehouse_type = warehouse_type;
        self
    }
}

/// Occupancy of a location against its capacity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCapacity {
    pub location_id: LocationId,
    pub capacity: Capacity,
    pub occupied_items: i64,
    /// None when the location has no item limit.
    pub remaining_items: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warehouse_type_round_trips_through_str() {
        for t in [
            WarehouseType::Distribution,
            WarehouseType::Fulfillment,
            WarehouseType::Retail,
            WarehouseType::Returns,
            WarehouseType::ThirdParty,
        ] {
            assert_eq!(t.as_str().parse::<WarehouseType>().unwrap(), t);
        }
        assert!("moon_base".parse::<WarehouseType>().is_err());
    }

    #[test]
    fn capacity_rejects_non_positive_limits() {
        assert!(Capacity::items(10).validate().is_ok());
        assert!(Capacity::items(0).validate().is_err());
        let weight = Capacity {
            max_weight: Some(-1.0),
            ..Default::default()
        };
        assert!(weight.validate().is_err());
        assert!(Capacity::default().validate().is_ok());
    }

    #[test]
    fn address_requires_core_fields() {
        let mut address = Address {
            line1: "1 Dock Rd".into(),
            city: "Reno".into(),
            postal_code: "89501".into(),
            country: "US".into(),
            ..Default::default()
        };
        assert!(address.validate().is_ok());
        address.city = " ".into();
        assert!(address.validate().is_err());
    }
}
