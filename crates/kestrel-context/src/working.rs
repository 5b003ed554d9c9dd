// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sticky entity-slot cache used to resolve follow-up queries.

use kestrel_core::{Entities, Slot};
use serde::Serialize;

/// Most recent value seen for each entity slot.
///
/// Slots are only ever overwritten, never cleared by an update that lacks
/// them; [`WorkingMemory::clear`] is the only way to drop a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkingMemory {
    slots: Entities,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites every slot present in `entities`, leaving the rest untouched.
    pub fn update(&mut self, entities: &Entities) {
        for (slot, value) in entities {
            if !value.trim().is_empty() {
                self.slots.insert(*slot, value.clone());
            }
        }
    }

    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.slots.get(&slot).map(String::as_str)
    }

    pub fn slots(&self) -> &Entities {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Renders the slots as `device: X, time period: Y`, or `None` when empty.
    pub fn render(&self) -> Option<String> {
        if self.slots.is_empty() {
            return None;
        }
        Some(
            self.slots
                .iter()
                .map(|(slot, value)| format!("{}: {value}", slot.label()))
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}
