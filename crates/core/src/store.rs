//! Ordered slot collection and its status transitions.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::{
    error::{StoreResult, StorefrontError},
    models::{BuyerDetails, Sale, Slot, SlotId},
};

/// Immutable grid of slots.
///
/// Cloning is cheap; [`SlotStore::mark_sold`] copies the backing vector and
/// hands back a new store, leaving the receiver untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStore {
    rows: usize,
    cols: usize,
    slots: Arc<Vec<Slot>>,
}

impl SlotStore {
    /// Create `rows * cols` available slots in row-major order.
    pub fn initialize(rows: usize, cols: usize, price_fn: impl Fn(SlotId) -> u64) -> Self {
        let slots = (0..rows * cols)
            .map(|id| Slot::new(id, price_fn(id)))
            .collect::<Vec<_>>();
        Self {
            rows,
            cols,
            slots: Arc::new(slots),
        }
    }

    /// Number of grid rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of grid columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// All slots in id order.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Total slot count.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the grid has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Look up a slot by id.
    pub fn get(&self, id: SlotId) -> StoreResult<&Slot> {
        self.slots.get(id).ok_or(StorefrontError::NotFound(id))
    }

    /// Look up the slot at a grid position.
    pub fn at(&self, row: usize, col: usize) -> Option<&Slot> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.slots.get(row * self.cols + col)
    }

    /// Grid position of a slot id.
    pub fn position(&self, id: SlotId) -> Option<(usize, usize)> {
        if id >= self.slots.len() || self.cols == 0 {
            return None;
        }
        Some((id / self.cols, id % self.cols))
    }

    /// Slots grouped by row, top to bottom.
    pub fn rows_iter(&self) -> impl Iterator<Item = &[Slot]> {
        self.slots.chunks(self.cols.max(1))
    }

    /// Number of slots already sold.
    pub fn sold_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_sold()).count()
    }

    /// Number of slots still available.
    pub fn available_count(&self) -> usize {
        self.len() - self.sold_count()
    }

    /// Return a new store with `id` settled to `buyer`.
    ///
    /// Fails with `NotFound` for an unknown id and `InvalidTransition` when the
    /// slot is already sold; in both cases `self` is unchanged.
    pub fn mark_sold(&self, id: SlotId, buyer: &BuyerDetails) -> StoreResult<SlotStore> {
        let slot = self.get(id)?;
        if slot.is_sold() {
            return Err(StorefrontError::InvalidTransition(id));
        }

        let mut next = self.clone();
        let slots = Arc::make_mut(&mut next.slots);
        slots[id].settle(Sale {
            owner: buyer.company_name.clone(),
            logo_url: buyer.logo_url.clone(),
            sold_at: Utc::now(),
        });
        debug!(slot_id = id, owner = %buyer.company_name, "Slot marked sold");
        Ok(next)
    }
}
