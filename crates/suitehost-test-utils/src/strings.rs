//! Fixed string table resolving opaque references.

use std::collections::HashMap;

use suitehost_core::{StringResolver, ZStringRef};

/// Resolver over a fixed set of strings.
///
/// References are minted sequentially from 1 by [`insert`](Self::insert).
#[derive(Default)]
pub struct FixedStrings {
    strings: HashMap<u64, String>,
    next: u64,
}

impl FixedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `text` and return a reference that resolves to it.
    pub fn insert(&mut self, text: impl Into<String>) -> ZStringRef {
        self.next += 1;
        self.strings.insert(self.next, text.into());
        ZStringRef::from_raw(self.next).unwrap()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl StringResolver for FixedStrings {
    fn resolve(&self, reference: ZStringRef) -> Option<String> {
        self.strings.get(&reference.to_raw()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_strings_resolve() {
        let mut strings = FixedStrings::new();
        let a = strings.insert("alpha");
        let b = strings.insert("beta");
        assert_ne!(a, b);
        assert_eq!(strings.resolve(a).as_deref(), Some("alpha"));
        assert_eq!(strings.resolve(ZStringRef::from_raw(99).unwrap()), None);
    }
}
