//! Typed extension attributes for inventory items.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::InventoryError;

/// Maximum number of attributes per item.
pub const MAX_ATTRIBUTES: usize = 32;

const MAX_KEY_LEN: usize = 64;
const MAX_TEXT_LEN: usize = 256;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
}

/// Bounded map of validated attribute keys to typed values.
///
/// Keys are lower-case ASCII letters, digits, `_`, `-` or `.`, starting with a
/// letter. Decimals must be finite and text is limited in length.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, AttributeValue>", into = "BTreeMap<String, AttributeValue>")]
pub struct ItemAttributes(BTreeMap<String, AttributeValue>);

impl ItemAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an attribute.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: AttributeValue,
    ) -> Result<(), InventoryError> {
        let key = key.into();
        validate_key(&key)?;
        validate_value(&key, &value)?;
        if !self.0.contains_key(&key) && self.0.len() >= MAX_ATTRIBUTES {
            return Err(InventoryError::Validation(format!(
                "an item may carry at most {MAX_ATTRIBUTES} attributes"
            )));
        }
        self.0.insert(key, value);
        Ok(())
    }

    pub fn with(mut self, key: impl Into<String>, value: AttributeValue) -> Result<Self, InventoryError> {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }
}

fn validate_key(key: &str) -> Result<(), InventoryError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.starts_with(|c: char| c.is_ascii_lowercase())
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(InventoryError::Validation(format!(
            "invalid attribute key: {key:?}"
        )))
    }
}

fn validate_value(key: &str, value: &AttributeValue) -> Result<(), InventoryError> {
    match value {
        AttributeValue::Decimal(v) if !v.is_finite() => Err(InventoryError::Validation(format!(
            "attribute {key} must be a finite number"
        ))),
        AttributeValue::Text(s) if s.chars().count() > MAX_TEXT_LEN => {
            Err(InventoryError::Validation(format!(
                "attribute {key} exceeds {MAX_TEXT_LEN} characters"
            )))
        }
        _ => Ok(()),
    }
}

impl TryFrom<BTreeMap<String, AttributeValue>> for ItemAttributes {
    type Error = InventoryError;

    fn try_from(map: BTreeMap<String, AttributeValue>) -> Result<Self, Self::Error> {
        let mut attributes = ItemAttributes::new();
        for (key, value) in map {
            attributes.insert(key, value)?;
        }
        Ok(attributes)
    }
}

impl From<ItemAttributes> for BTreeMap<String, AttributeValue> {
    fn from(attributes: ItemAttributes) -> Self {
        attributes.0
    }
}
