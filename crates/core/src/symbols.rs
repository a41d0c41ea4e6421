//! Symbol interning.
//!
//! Contracts and orders reference their underlying by a compact [`SymbolId`]
//! instead of a `String`. One [`SymbolTable`] is built at startup and shared
//! by `Arc` with every component that needs to translate ids back to names.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Compact symbol reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

impl SymbolId {
    /// Sentinel for "no symbol".
    pub const INVALID: Self = Self(u32::MAX);

    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl Default for SymbolId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Inner {
    by_name: HashMap<String, SymbolId>,
    names: Vec<String>,
}

/// Bidirectional `String` <-> [`SymbolId`] table. Ids are dense and never reused.
#[derive(Debug, Default)]
pub struct SymbolTable {
    inner: RwLock<Inner>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table pre-populated with `symbols`, in order.
    pub fn with_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let table = Self::new();
        for symbol in symbols {
            table.intern(symbol.as_ref());
        }
        table
    }

    /// Returns the id for `symbol`, assigning the next free id on first sight.
    pub fn intern(&self, symbol: &str) -> SymbolId {
        if let Some(id) = self.id(symbol) {
            return id;
        }

        let mut inner = self.inner.write();
        // Another writer may have raced us between the read and write lock.
        if let Some(&id) = inner.by_name.get(symbol) {
            return id;
        }
        let id = SymbolId(u32::try_from(inner.names.len()).unwrap_or(u32::MAX - 1));
        inner.names.push(symbol.to_string());
        inner.by_name.insert(symbol.to_string(), id);
        tracing::debug!(symbol, id = id.0, "Interned symbol");
        id
    }

    #[must_use]
    pub fn id(&self, symbol: &str) -> Option<SymbolId> {
        self.inner.read().by_name.get(symbol).copied()
    }

    #[must_use]
    pub fn symbol(&self, id: SymbolId) -> Option<String> {
        let inner = self.inner.read();
        usize::try_from(id.0)
            .ok()
            .and_then(|idx| inner.names.get(idx))
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.inner.read().by_name.contains_key(symbol)
    }

    #[must_use]
    pub fn contains_id(&self, id: SymbolId) -> bool {
        usize::try_from(id.0).is_ok_and(|idx| idx < self.inner.read().names.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All symbols in id order.
    #[must_use]
    pub fn symbols(&self) -> Vec<String> {
        self.inner.read().names.clone()
    }
}
