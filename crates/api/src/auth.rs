//! Caller identity supplied by the identity layer in request headers.

use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

/// Roles recognised by the inventory service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    InventoryAdmin,
    InventoryManager,
    InventoryViewer,
    OrderService,
    ProductService,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::InventoryAdmin => "inventory-admin",
            Role::InventoryManager => "inventory-manager",
            Role::InventoryViewer => "inventory-viewer",
            Role::OrderService => "order-service",
            Role::ProductService => "product-service",
        }
    }
}

impl FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inventory-admin" => Ok(Role::InventoryAdmin),
            "inventory-manager" => Ok(Role::InventoryManager),
            "inventory-viewer" => Ok(Role::InventoryViewer),
            "order-service" => Ok(Role::OrderService),
            "product-service" => Ok(Role::ProductService),
            other => Err(ApiError::Forbidden(format!("unknown role: {other}"))),
        }
    }
}

/// Roles allowed to change stock, warehouses and items.
pub const MANAGE: &[Role] = &[Role::InventoryAdmin, Role::InventoryManager];

/// Roles allowed to drive the allocation lifecycle.
pub const ALLOCATE: &[Role] = &[
    Role::InventoryAdmin,
    Role::InventoryManager,
    Role::OrderService,
];

/// The authenticated caller. Any known role may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    /// Fails with `FORBIDDEN` unless the caller holds one of `roles`.
    pub fn require(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "role {} may not perform this operation",
                self.role.as_str()
            )))
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let role = header(parts, PRINCIPAL_ROLE_HEADER)
            .ok_or_else(|| ApiError::Forbidden("missing principal role".to_string()))?
            .parse()?;
        let id = header(parts, PRINCIPAL_ID_HEADER)
            .ok_or_else(|| ApiError::Forbidden("missing principal id".to_string()))?
            .to_string();
        Ok(Principal { id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("Inventory-Admin".parse::<Role>().unwrap(), Role::InventoryAdmin);
        assert!("warehouse-robot".parse::<Role>().is_err());
    }

    #[test]
    fn viewers_cannot_manage() {
        let viewer = Principal {
            id: "u-1".to_string(),
            role: Role::InventoryViewer,
        };
        assert!(matches!(viewer.require(MANAGE), Err(ApiError::Forbidden(_))));

        let orders = Principal {
            id: "svc-orders".to_string(),
            role: Role::OrderService,
        };
        assert!(orders.require(ALLOCATE).is_ok());
        assert!(orders.require(MANAGE).is_err());
    }
}
