use chrono::{DateTime, Utc};
use common::{InventoryItemId, LocationId, TransactionId, WarehouseId};
use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// The kind of quantity-affecting event a transaction records.
///
/// Sign convention for [`StockTransaction::quantity`]:
///
/// | Type | Sign | Moves |
/// |---|---|---|
/// | `Receipt`, `Return`, `TransferIn` | `> 0` | on hand |
/// | `TransferOut`, `Damage`, `Expiry` | `< 0` | on hand |
/// | `Adjustment` | `≠ 0` | on hand |
/// | `CycleCount` | any | on hand |
/// | `Sale` | `< 0` | on hand and reserved |
/// | `Reservation` | `> 0` | reserved |
/// | `ReservationRelease` | `< 0` | reserved |
/// | `LocationAssignment` | `> 0` | neither (moves between bins) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Receipt,
    Adjustment,
    TransferOut,
    TransferIn,
    Sale,
    Return,
    Reservation,
    ReservationRelease,
    LocationAssignment,
    CycleCount,
    Damage,
    Expiry,
}

impl TransactionType {
    /// All transaction types, in declaration order.
    pub const ALL: [TransactionType; 12] = [
        TransactionType::Receipt,
        TransactionType::Adjustment,
        TransactionType::TransferOut,
        TransactionType::TransferIn,
        TransactionType::Sale,
        TransactionType::Return,
        TransactionType::Reservation,
        TransactionType::ReservationRelease,
        TransactionType::LocationAssignment,
        TransactionType::CycleCount,
        TransactionType::Damage,
        TransactionType::Expiry,
    ];

    /// Change to `quantity_on_hand` caused by a transaction of this type.
    pub fn on_hand_effect(&self, quantity: i64) -> i64 {
        match self {
            TransactionType::Reservation
            | TransactionType::ReservationRelease
            | TransactionType::LocationAssignment => 0,
            _ => quantity,
        }
    }

    /// Change to `quantity_reserved` caused by a transaction of this type.
    pub fn reserved_effect(&self, quantity: i64) -> i64 {
        match self {
            TransactionType::Reservation
            | TransactionType::ReservationRelease
            | TransactionType::Sale => quantity,
            _ => 0,
        }
    }

    /// Returns true if `previous_quantity`/`new_quantity` describe the reserved
    /// quantity rather than the on-hand quantity.
    pub fn tracks_reserved(&self) -> bool {
        matches!(
            self,
            TransactionType::Reservation | TransactionType::ReservationRelease
        )
    }

    /// Returns true if `quantity` has an acceptable sign for this type.
    pub fn accepts_quantity(&self, quantity: i64) -> bool {
        match self {
            TransactionType::Receipt
            | TransactionType::Return
            | TransactionType::TransferIn
            | TransactionType::Reservation
            | TransactionType::LocationAssignment => quantity > 0,
            TransactionType::TransferOut
            | TransactionType::Damage
            | TransactionType::Expiry
            | TransactionType::Sale
            | TransactionType::ReservationRelease => quantity < 0,
            TransactionType::Adjustment => quantity != 0,
            TransactionType::CycleCount => true,
        }
    }

    /// Returns the wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Receipt => "RECEIPT",
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::TransferOut => "TRANSFER_OUT",
            TransactionType::TransferIn => "TRANSFER_IN",
            TransactionType::Sale => "SALE",
            TransactionType::Return => "RETURN",
            TransactionType::Reservation => "RESERVATION",
            TransactionType::ReservationRelease => "RESERVATION_RELEASE",
            TransactionType::LocationAssignment => "LOCATION_ASSIGNMENT",
            TransactionType::CycleCount => "CYCLE_COUNT",
            TransactionType::Damage => "DAMAGE",
            TransactionType::Expiry => "EXPIRY",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| LedgerError::Decode(format!("unknown transaction type: {s}")))
    }
}

/// Per-item position of a transaction in the ledger.
///
/// Sequences start at 1 for an item's first transaction and increase by one
/// for each subsequent transaction, which makes them usable as an optimistic
/// concurrency token when appending.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(i64);

impl Sequence {
    /// Creates a sequence from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The position before an item's first transaction.
    pub fn initial() -> Self {
        Self(0)
    }

    /// The position of an item's first transaction.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next sequence.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External reference a transaction was recorded against, such as an order,
/// a purchase receipt, or a shipment.
///
/// The `(reference_type, reference_number)` pair doubles as the idempotency key
/// for retried requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub reference_type: String,
    pub reference_number: String,
}

impl Reference {
    pub fn new(reference_type: impl Into<String>, reference_number: impl Into<String>) -> Self {
        Self {
            reference_type: reference_type.into(),
            reference_number: reference_number.into(),
        }
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.reference_type, self.reference_number)
    }
}

/// An immutable ledger entry.
///
/// Corrections are recorded as new offsetting transactions; existing entries
/// are never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTransaction {
    pub id: TransactionId,

    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    pub inventory_item_id: InventoryItemId,

    /// Position in the item's ledger.
    pub sequence: Sequence,

    /// Signed quantity; see [`TransactionType`] for the sign convention.
    pub quantity: i64,

    pub warehouse_id: WarehouseId,

    pub location_id: Option<LocationId>,

    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,

    /// Links the two legs of a transfer, or a compensation to what it undoes.
    pub related_transaction_id: Option<TransactionId>,

    /// Tracked quantity before the transaction (reserved for reservation
    /// types, on hand otherwise).
    pub previous_quantity: i64,

    /// Tracked quantity after the transaction.
    pub new_quantity: i64,

    pub reason: Option<String>,

    pub created_at: DateTime<Utc>,

    pub created_by: String,
}

impl StockTransaction {
    /// Creates a new transaction builder.
    pub fn builder() -> StockTransactionBuilder {
        StockTransactionBuilder::default()
    }

    /// Change to on-hand quantity caused by this transaction.
    pub fn on_hand_effect(&self) -> i64 {
        self.transaction_type.on_hand_effect(self.quantity)
    }

    /// Change to reserved quantity caused by this transaction.
    pub fn reserved_effect(&self) -> i64 {
        self.transaction_type.reserved_effect(self.quantity)
    }

    /// Returns true if this transaction was recorded against `reference`.
    pub fn has_reference(&self, reference: &Reference) -> bool {
        self.reference.as_ref() == Some(reference)
    }
}

/// Builder for constructing stock transactions.
#[derive(Debug, Default)]
pub struct StockTransactionBuilder {
    id: Option<TransactionId>,
    transaction_type: Option<TransactionType>,
    inventory_item_id: Option<InventoryItemId>,
    sequence: Option<Sequence>,
    quantity: Option<i64>,
    warehouse_id: Option<WarehouseId>,
    location_id: Option<LocationId>,
    reference: Option<Reference>,
    related_transaction_id: Option<TransactionId>,
    previous_quantity: Option<i64>,
    new_quantity: Option<i64>,
    reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
    created_by: Option<String>,
}

impl StockTransactionBuilder {
    /// Sets the transaction ID. If not set, a new ID will be generated.
    pub fn id(mut self, id: TransactionId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    pub fn inventory_item_id(mut self, id: InventoryItemId) -> Self {
        self.inventory_item_id = Some(id);
        self
    }

    pub fn sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn warehouse_id(mut self, id: WarehouseId) -> Self {
        self.warehouse_id = Some(id);
        self
    }

    pub fn location_id(mut self, id: Option<LocationId>) -> Self {
        self.location_id = id;
        self
    }

    pub fn reference(mut self, reference: Option<Reference>) -> Self {
        self.reference = reference;
        self
    }

    pub fn related_transaction_id(mut self, id: Option<TransactionId>) -> Self {
        self.related_transaction_id = id;
        self
    }

    /// Sets the tracked quantity before and after the transaction.
    pub fn quantities(mut self, previous: i64, new: i64) -> Self {
        self.previous_quantity = Some(previous);
        self.new_quantity = Some(new);
        self
    }

    pub fn reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    /// Sets the creation time. If not set, the current time will be used.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    /// Builds the transaction, failing if a required field is missing.
    pub fn build(self) -> Result<StockTransaction, LedgerError> {
        fn required<T>(value: Option<T>, field: &str) -> Result<T, LedgerError> {
            value.ok_or_else(|| LedgerError::InvalidAppend(format!("{field} is required")))
        }

        Ok(StockTransaction {
            id: self.id.unwrap_or_default(),
            transaction_type: required(self.transaction_type, "transaction_type")?,
            inventory_item_id: required(self.inventory_item_id, "inventory_item_id")?,
            sequence: required(self.sequence, "sequence")?,
            quantity: required(self.quantity, "quantity")?,
            warehouse_id: required(self.warehouse_id, "warehouse_id")?,
            location_id: self.location_id,
            reference: self.reference,
            related_transaction_id: self.related_transaction_id,
            previous_quantity: required(self.previous_quantity, "previous_quantity")?,
            new_quantity: required(self.new_quantity, "new_quantity")?,
            reason: self.reason,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            created_by: self.created_by.unwrap_or_else(|| "system".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sale_moves_on_hand_and_reserved() {
        assert_eq!(TransactionType::Sale.on_hand_effect(-3), -3);
        assert_eq!(TransactionType::Sale.reserved_effect(-3), -3);
        assert!(!TransactionType::Sale.tracks_reserved());
    }

    #[test]
    fn reservation_moves_only_reserved() {
        assert_eq!(TransactionType::Reservation.on_hand_effect(5), 0);
        assert_eq!(TransactionType::Reservation.reserved_effect(5), 5);
        assert!(TransactionType::Reservation.tracks_reserved());
        assert!(TransactionType::ReservationRelease.tracks_reserved());
    }

    #[test]
    fn location_assignment_moves_nothing() {
        assert_eq!(TransactionType::LocationAssignment.on_hand_effect(7), 0);
        assert_eq!(TransactionType::LocationAssignment.reserved_effect(7), 0);
    }

    #[test]
    fn sign_convention() {
        assert!(TransactionType::Receipt.accepts_quantity(1));
        assert!(!TransactionType::Receipt.accepts_quantity(-1));
        assert!(TransactionType::Sale.accepts_quantity(-1));
        assert!(!TransactionType::Sale.accepts_quantity(1));
        assert!(!TransactionType::Adjustment.accepts_quantity(0));
        assert!(TransactionType::CycleCount.accepts_quantity(0));
    }

    #[test]
    fn type_names_round_trip_through_from_str() {
        for t in TransactionType::ALL {
            assert_eq!(t.as_str().parse::<TransactionType>().unwrap(), t);
        }
        assert!("BOGUS".parse::<TransactionType>().is_err());
    }

    #[test]
    fn type_serializes_in_screaming_snake_case() {
        let json = serde_json::to_string(&TransactionType::ReservationRelease).unwrap();
        assert_eq!(json, "\"RESERVATION_RELEASE\"");
    }

    #[test]
    fn sequence_ordering() {
        assert_eq!(Sequence::initial().next(), Sequence::first());
        assert!(Sequence::new(1) < Sequence::new(2));
    }

    #[test]
    fn builder_requires_type() {
        let result = StockTransaction::builder()
            .inventory_item_id(InventoryItemId::new())
            .sequence(Sequence::first())
            .quantity(1)
            .warehouse_id(WarehouseId::new())
            .quantities(0, 1)
            .build();
        assert!(matches!(result, Err(LedgerError::InvalidAppend(_))));
    }

    #[test]
    fn reference_flattens_into_transaction_json() {
        let tx = StockTransaction::builder()
            .transaction_type(TransactionType::Receipt)
            .inventory_item_id(InventoryItemId::new())
            .sequence(Sequence::first())
            .quantity(10)
            .warehouse_id(WarehouseId::new())
            .reference(Some(Reference::new("PURCHASE_ORDER", "PO-1")))
            .quantities(0, 10)
            .created_by("tester")
            .build()
            .unwrap();

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "RECEIPT");
        assert_eq!(json["referenceType"], "PURCHASE_ORDER");
        assert_eq!(json["referenceNumber"], "PO-1");
        assert_eq!(json["previousQuantity"], 0);
        assert_eq!(json["newQuantity"], 10);
    }
}
