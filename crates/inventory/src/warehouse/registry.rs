use std::sync::Arc;

use chrono::Utc;
use common::{LocationId, WarehouseId, ZoneId};

use super::{
    Capacity, DEFAULT_LOCATION_CODE, DEFAULT_ZONE_NAME, Location, LocationCapacity, NewWarehouse,
    RegisteredWarehouse, Warehouse, Zone,
};
use crate::error::{InventoryError, Result};
use crate::repository::InventoryRepository;

const MAX_CODE_LEN: usize = 64;

/// Normalizes a warehouse or location code: trimmed, upper-case, limited to
/// letters, digits, `-` and `_`.
fn normalize_code(kind: &str, code: &str) -> Result<String> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return Err(InventoryError::Validation(format!("{kind} code is required")));
    }
    if code.len() > MAX_CODE_LEN {
        return Err(InventoryError::Validation(format!(
            "{kind} code must be at most {MAX_CODE_LEN} characters"
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(InventoryError::Validation(format!(
            "{kind} code may only contain letters, digits, '-' and '_'"
        )));
    }
    Ok(code)
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(InventoryError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Catalog of warehouses, zones and bin locations.
pub struct WarehouseRegistry<R> {
    repo: Arc<R>,
}

impl<R> Clone for WarehouseRegistry<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R: InventoryRepository> WarehouseRegistry<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Registers a warehouse with its default `STAGING` zone and `RECEIVING`
    /// location.
    #[tracing::instrument(skip(self, request), fields(code = %request.code))]
    pub async fn register_warehouse(&self, request: NewWarehouse) -> Result<RegisteredWarehouse> {
        let name = required("name", &request.name)?;
        let code = normalize_code("warehouse", &request.code)?;
        request.address.validate()?;

        if self.repo.get_warehouse_by_code(&code).await?.is_some() {
            return Err(InventoryError::DuplicateWarehouseCode(code));
        }

        let now = Utc::now();
        let warehouse_id = WarehouseId::new();
        let zone = Zone {
            id: ZoneId::new(),
            warehouse_id,
            name: DEFAULT_ZONE_NAME.to_string(),
            capacity: Capacity::default(),
            created_at: now,
        };
        let location = Location {
            id: LocationId::new(),
            warehouse_id,
            zone_id: zone.id,
            code: DEFAULT_LOCATION_CODE.to_string(),
            capacity: Capacity::default(),
            created_at: now,
        };
        let warehouse = Warehouse {
            id: warehouse_id,
            name,
            code,
            warehouse_type: request.warehouse_type,
            address: request.address,
            is_active: true,
            default_location_id: location.id,
            created_at: now,
            updated_at: now,
        };

        self.repo
            .insert_warehouse(
                &warehouse,
                std::slice::from_ref(&zone),
                std::slice::from_ref(&location),
            )
            .await?;

        tracing::info!(warehouse_id = %warehouse.id, code = %warehouse.code, "warehouse registered");

        Ok(RegisteredWarehouse {
            warehouse,
            zone,
            location,
        })
    }

    #[tracing::instrument(skip(self, name, capacity))]
    pub async fn add_zone(
        &self,
        warehouse_id: WarehouseId,
        name: &str,
        capacity: Capacity,
    ) -> Result<Zone> {
        let name = required("name", name)?;
        capacity.validate()?;
        self.get_warehouse(warehouse_id).await?;

        let zone = Zone {
            id: ZoneId::new(),
            warehouse_id,
            name,
            capacity,
            created_at: Utc::now(),
        };
        self.repo.insert_zone(&zone).await?;
        Ok(zone)
    }

    #[tracing::instrument(skip(self, code, capacity))]
    pub async fn add_location(
        &self,
        zone_id: ZoneId,
        code: &str,
        capacity: Capacity,
    ) -> Result<Location> {
        let code = normalize_code("location", code)?;
        capacity.validate()?;
        let zone = self
            .repo
            .get_zone(zone_id)
            .await?
            .ok_or(InventoryError::ZoneNotFound(zone_id))?;

        if let (Some(zone_max), Some(max)) = (zone.capacity.max_items, capacity.max_items)
            && max > zone_max
        {
            return Err(InventoryError::Validation(format!(
                "location capacity {max} exceeds zone capacity {zone_max}"
            )));
        }

        let location = Location {
            id: LocationId::new(),
            warehouse_id: zone.warehouse_id,
            zone_id,
            code,
            capacity,
            created_at: Utc::now(),
        };
        self.repo.insert_location(&location).await?;
        Ok(location)
    }

    pub async fn get_warehouse(&self, id: WarehouseId) -> Result<Warehouse> {
        self.repo
            .get_warehouse(id)
            .await?
            .ok_or_else(|| InventoryError::WarehouseNotFound(id.to_string()))
    }

    pub async fn get_warehouse_by_code(&self, code: &str) -> Result<Warehouse> {
        let normalized = code.trim().to_uppercase();
        self.repo
            .get_warehouse_by_code(&normalized)
            .await?
            .ok_or(InventoryError::WarehouseNotFound(normalized))
    }

    /// Fetches a warehouse that may take part in stock operations.
    ///
    /// Deactivated warehouses are reported as not found.
    pub async fn active_warehouse(&self, id: WarehouseId) -> Result<Warehouse> {
        let warehouse = self.get_warehouse(id).await?;
        if !warehouse.is_active {
            return Err(InventoryError::WarehouseNotFound(id.to_string()));
        }
        Ok(warehouse)
    }

    pub async fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        Ok(self.repo.list_warehouses().await?)
    }

    pub async fn list_zones(&self, warehouse_id: WarehouseId) -> Result<Vec<Zone>> {
        self.get_warehouse(warehouse_id).await?;
        Ok(self.repo.list_zones(warehouse_id).await?)
    }

    pub async fn list_locations(&self, warehouse_id: WarehouseId) -> Result<Vec<Location>> {
        self.get_warehouse(warehouse_id).await?;
        Ok(self.repo.list_locations(warehouse_id).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn deactivate_warehouse(&self, id: WarehouseId) -> Result<Warehouse> {
        let mut warehouse = self.get_warehouse(id).await?;
        if warehouse.is_active {
            warehouse.is_active = false;
            warehouse.updated_at = Utc::now();
            self.repo.update_warehouse(&warehouse).await?;
            tracing::info!(warehouse_id = %id, "warehouse deactivated");
        }
        Ok(warehouse)
    }

    /// Fetches a location and checks it belongs to `warehouse_id`.
    pub async fn location_in(
        &self,
        warehouse_id: WarehouseId,
        location_id: LocationId,
    ) -> Result<Location> {
        let location = self
            .repo
            .get_location(location_id)
            .await?
            .ok_or(InventoryError::LocationNotFound(location_id))?;
        if location.warehouse_id != warehouse_id {
            return Err(InventoryError::Validation(format!(
                "location {location_id} does not belong to warehouse {warehouse_id}"
            )));
        }
        Ok(location)
    }

    /// Resolves the location an incoming movement lands in: the named one if
    /// it belongs to the warehouse, otherwise the warehouse's receiving
    /// location.
    pub async fn resolve_location(
        &self,
        warehouse_id: WarehouseId,
        location_id: Option<LocationId>,
    ) -> Result<LocationId> {
        let warehouse = self.active_warehouse(warehouse_id).await?;
        match location_id {
            Some(id) => Ok(self.location_in(warehouse_id, id).await?.id),
            None => Ok(warehouse.default_location_id),
        }
    }

    /// Occupancy of a location across all items.
    pub async fn location_capacity(&self, location_id: LocationId) -> Result<LocationCapacity> {
        let location = self
            .repo
            .get_location(location_id)
            .await?
            .ok_or(InventoryError::LocationNotFound(location_id))?;
        let occupied = self.repo.location_occupancy(location_id).await?;
        Ok(LocationCapacity {
            location_id,
            capacity: location.capacity,
            occupied_items: occupied,
            remaining_items: location.capacity.max_items.map(|max| (max - occupied).max(0)),
        })
    }

    /// Fails with `LocationCapacityExceeded` if adding `incoming` units would
    /// overfill the location's item limit.
    pub async fn check_capacity(&self, location_id: LocationId, incoming: i64) -> Result<()> {
        let capacity = self.location_capacity(location_id).await?;
        if let Some(max) = capacity.capacity.max_items
            && capacity.occupied_items + incoming > max
        {
            return Err(InventoryError::LocationCapacityExceeded {
                location_id,
                capacity: max,
                occupied: capacity.occupied_items,
                requested: incoming,
            });
        }
        Ok(())
    }
}
