//! Slot+generation token table for values whose identity crosses the
//! plugin boundary.
//!
//! Released tokens carry a stale generation and resolve to `None`
//! instead of aliasing whatever reuses the slot. Releasing twice is a
//! safe no-op. Tokens are never zero, so a zero token can keep its usual
//! meaning of "no handle" on the plugin side.

use std::num::NonZeroU64;

/// Token encoding: `((slot << 32) | generation) + 1`.
fn encode(slot: u32, generation: u32) -> NonZeroU64 {
    NonZeroU64::MIN.saturating_add(((slot as u64) << 32) | (generation as u64))
}

fn decode(token: u64) -> Option<(u32, u32)> {
    let packed = token.checked_sub(1)?;
    Some(((packed >> 32) as u32, packed as u32))
}

struct Slot<T> {
    generation: u32,
    data: Option<T>,
}

/// A slot+generation table mapping non-zero `u64` tokens to owned values.
///
/// Reuses slots via a free list. Generation counters increment on removal,
/// making stale tokens detectable.
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    live: usize,
}

impl<T> HandleTable<T> {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Insert a value and return its token.
    pub fn insert(&mut self, value: T) -> NonZeroU64 {
        self.live += 1;
        if let Some(slot_idx) = self.free_list.pop() {
            let slot = &mut self.slots[slot_idx as usize];
            slot.data = Some(value);
            encode(slot_idx, slot.generation)
        } else {
            let slot_idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                data: Some(value),
            });
            encode(slot_idx, 0)
        }
    }

    /// Shared access to the value behind a token.
    ///
    /// Returns `None` if the token is stale or was never valid.
    pub fn get(&self, token: impl Into<u64>) -> Option<&T> {
        let (slot_idx, generation) = decode(token.into())?;
        let slot = self.slots.get(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.data.as_ref()
    }

    /// Mutable access to the value behind a token.
    pub fn get_mut(&mut self, token: impl Into<u64>) -> Option<&mut T> {
        let (slot_idx, generation) = decode(token.into())?;
        let slot = self.slots.get_mut(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.data.as_mut()
    }

    /// Whether the token currently resolves.
    pub fn contains(&self, token: impl Into<u64>) -> bool {
        self.get(token).is_some()
    }

    /// Remove the value behind a token, returning it.
    ///
    /// Increments the generation and recycles the slot. A slot whose
    /// generation wraps back to 0 is retired instead, so a token from the
    /// first epoch can never resolve again.
    pub fn remove(&mut self, token: impl Into<u64>) -> Option<T> {
        let (slot_idx, generation) = decode(token.into())?;
        let slot = self.slots.get_mut(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.data.take()?;
        self.live -= 1;
        slot.generation = slot.generation.wrapping_add(1);
        if slot.generation != 0 {
            self.free_list.push(slot_idx);
        }
        Some(value)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the table holds no live values.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate live `(token, value)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NonZeroU64, &T)> {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            slot.data
                .as_ref()
                .map(|value| (encode(idx as u32, slot.generation), value))
        })
    }

    /// Remove every live value, invalidating all outstanding tokens.
    pub fn drain(&mut self) -> Vec<(NonZeroU64, T)> {
        let tokens: Vec<NonZeroU64> = self.iter().map(|(token, _)| token).collect();
        tokens
            .into_iter()
            .filter_map(|token| self.remove(token).map(|value| (token, value)))
            .collect()
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
