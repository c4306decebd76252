use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Each identifier is a distinct type so an allocation ID can never be
/// passed where an inventory item ID is expected.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identifies one SKU stocked in one warehouse.
    InventoryItemId
);
uuid_id!(
    /// Identifies a warehouse.
    WarehouseId
);
uuid_id!(
    /// Identifies a zone inside a warehouse.
    ZoneId
);
uuid_id!(
    /// Identifies a bin location inside a zone.
    LocationId
);
uuid_id!(
    /// Identifies an allocation (a reservation held against an order item).
    AllocationId
);
uuid_id!(
    /// Identifies a stock transaction in the ledger.
    TransactionId
);
uuid_id!(
    /// Identifies a pending outbound notification.
    MessageId
);
uuid_id!(
    /// Identifies an order in the upstream order-management context.
    OrderId
);
uuid_id!(
    /// Identifies a line of an upstream order.
    OrderItemId
);

/// Stock-keeping unit code.
///
/// SKUs are compared exactly; surrounding whitespace is trimmed on creation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Creates a SKU from a string.
    pub fn new(sku: impl Into<String>) -> Self {
        Self(sku.into().trim().to_string())
    }

    /// Returns the SKU as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the SKU is blank.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Sku {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Sku {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Product identifier in the catalog context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
