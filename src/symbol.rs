//! Interned symbols
//!
//! Every identifier that flows through working memory (WME fields, rule
//! names, fuzzy variable and value names) is interned to an `Arc<str>` so
//! that clones are cheap and equality is a pointer-or-string comparison.
//! The interner is owned by the matcher context; there is no global table.

use std::sync::Arc;

use fnv::FnvHashMap;

/// An interned string. Cloning is a reference-count bump.
pub type Symbol = Arc<str>;

/// Symbol interner backing a single reasoner context.
#[derive(Debug, Default)]
pub struct Interner {
    table: FnvHashMap<Box<str>, Symbol>,
}

impl Interner {
    /// Create an empty interner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning the canonical symbol for it.
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(sym) = self.table.get(s) {
            return sym.clone();
        }
        let sym: Symbol = Arc::from(s);
        self.table.insert(Box::from(s), sym.clone());
        sym
    }

    /// Look up a symbol without interning.
    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.table.get(s).cloned()
    }

    /// Number of distinct symbols interned.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no symbol has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_reuses_symbols() {
        let mut interner = Interner::new();
        let a = interner.intern("bird");
        let b = interner.intern("bird");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn test_intern_distinct() {
        let mut interner = Interner::new();
        let a = interner.intern("duck");
        let b = interner.intern("dodo");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn test_get_without_interning() {
        let mut interner = Interner::new();
        assert!(interner.get("robbin").is_none());
        interner.intern("robbin");
        assert!(interner.get("robbin").is_some());
    }
}
