use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use classorder_core::ClassId;

pub const MIN_QUANTITY: u32 = 1;
pub const MAX_QUANTITY: u32 = 999;

/// Clamp a requested quantity into `[MIN_QUANTITY, MAX_QUANTITY]`.
pub fn clamp_quantity(requested: i64) -> u32 {
    let clamped = requested.clamp(i64::from(MIN_QUANTITY), i64::from(MAX_QUANTITY));
    // In range after the clamp above.
    u32::try_from(clamped).unwrap_or(MIN_QUANTITY)
}

/// One selected class. Persisted as `{ "id": ..., "quantity": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    #[serde(rename = "id")]
    pub class_id: ClassId,
    pub quantity: u32,
}

impl CartEntry {
    pub fn new(class_id: ClassId, quantity: i64) -> Self {
        Self {
            class_id,
            quantity: clamp_quantity(quantity),
        }
    }
}

/// A learner's cart. Entries keep insertion order; class ids are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    entries: Vec<CartEntry>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, class_id: &ClassId) -> bool {
        self.position(class_id).is_some()
    }

    pub fn quantity_of(&self, class_id: &ClassId) -> Option<u32> {
        self.position(class_id).map(|i| self.entries[i].quantity)
    }

    /// Upsert. Re-adding a class replaces its quantity; it never sums.
    pub fn add(&mut self, class_id: ClassId, quantity: i64) {
        let quantity = clamp_quantity(quantity);
        match self.position(&class_id) {
            Some(i) => self.entries[i].quantity = quantity,
            None => self.entries.push(CartEntry { class_id, quantity }),
        }
    }

    /// Returns `false` when the class was not in the cart.
    pub fn remove(&mut self, class_id: &ClassId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.class_id != class_id);
        self.entries.len() != before
    }

    /// Returns `false` (and changes nothing) when the class is not in the cart.
    pub fn set_quantity(&mut self, class_id: &ClassId, quantity: i64) -> bool {
        match self.position(class_id) {
            Some(i) => {
                self.entries[i].quantity = clamp_quantity(quantity);
                true
            }
            None => false,
        }
    }

    /// Remove only the listed classes; everything else stays. Returns the number removed.
    pub fn clear(&mut self, class_ids: &[ClassId]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !class_ids.contains(&e.class_id));
        before - self.entries.len()
    }

    /// Parse a persisted cart, tolerating older formats.
    ///
    /// Accepts bare class-id strings (quantity 1), entries whose quantity is
    /// missing or below 1 (quantity 1), and skips anything else. A duplicate
    /// id keeps the quantity of its last occurrence.
    pub fn from_json(value: &JsonValue) -> Self {
        let mut cart = Cart::new();
        let Some(items) = value.as_array() else {
            return cart;
        };

        for item in items {
            match item {
                JsonValue::String(id) if !id.trim().is_empty() => {
                    cart.add(ClassId::from(id.as_str()), 1);
                }
                JsonValue::Object(obj) => {
                    let Some(id) = obj.get("id").and_then(JsonValue::as_str) else {
                        continue;
                    };
                    if id.trim().is_empty() {
                        continue;
                    }
                    let quantity = obj
                        .get("quantity")
                        .and_then(JsonValue::as_i64)
                        .filter(|q| *q >= 1)
                        .unwrap_or(1);
                    cart.add(ClassId::from(id), quantity);
                }
                _ => {}
            }
        }

        cart
    }

    fn position(&self, class_id: &ClassId) -> Option<usize> {
        self.entries.iter().position(|e| &e.class_id == class_id)
    }
}
