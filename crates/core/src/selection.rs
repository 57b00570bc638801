//! Purchase dialog visibility.

use crate::models::SlotId;

/// The purchase dialog is either closed or open on exactly one slot, so a
/// visible dialog always has a selection and closing it drops the selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Modal {
    /// No dialog, no selection.
    #[default]
    Closed,
    /// Dialog open for `slot_id`.
    Open {
        /// Selected slot.
        slot_id: SlotId,
    },
}

impl Modal {
    /// Selected slot, if the dialog is open.
    pub fn selected(&self) -> Option<SlotId> {
        match self {
            Modal::Open { slot_id } => Some(*slot_id),
            Modal::Closed => None,
        }
    }

    /// Whether the dialog is shown.
    pub fn is_visible(&self) -> bool {
        matches!(self, Modal::Open { .. })
    }
}
