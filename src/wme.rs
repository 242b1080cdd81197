//! Working-memory elements
//!
//! A WME is a `(id, attr, val)` triple of interned symbols. A fuzzy WME
//! additionally carries a membership degree in [0, 1]; the degree is the
//! only mutable field and uses `Cell` because the reasoner is strictly
//! single-threaded.
//!
//! WMEs are shared by `Rc` between the matcher's working-memory table and
//! the justification store. Justification payloads compare WMEs by pointer
//! identity; working-memory lookup is structural on the triple.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::symbol::Symbol;

/// A single working-memory element.
pub struct Wme {
    pub id: Symbol,
    pub attr: Symbol,
    pub val: Symbol,
    /// `Some` iff this is a fuzzy WME.
    degree: Option<Cell<f64>>,
}

impl Wme {
    /// Create a crisp WME.
    pub fn new(id: Symbol, attr: Symbol, val: Symbol) -> Self {
        Wme {
            id,
            attr,
            val,
            degree: None,
        }
    }

    /// Create a fuzzy WME with an initial membership degree.
    pub fn fuzzy(id: Symbol, attr: Symbol, val: Symbol, degree: f64) -> Self {
        Wme {
            id,
            attr,
            val,
            degree: Some(Cell::new(degree.clamp(0.0, 1.0))),
        }
    }

    /// Whether this WME carries a membership degree.
    pub fn is_fuzzy(&self) -> bool {
        self.degree.is_some()
    }

    /// Current membership degree, if fuzzy.
    pub fn degree(&self) -> Option<f64> {
        self.degree.as_ref().map(Cell::get)
    }

    /// Overwrite the membership degree. No-op on crisp WMEs.
    pub fn set_degree(&self, mu: f64) {
        if let Some(cell) = &self.degree {
            cell.set(mu.clamp(0.0, 1.0));
        }
    }

    /// The `val` field parsed as a finite number, if it is one.
    pub fn numeric_val(&self) -> Option<f64> {
        match self.val.parse::<f64>() {
            Ok(n) if n.is_finite() => Some(n),
            _ => None,
        }
    }

    /// Structural key for working-memory lookup.
    pub fn key(&self) -> (Symbol, Symbol, Symbol) {
        (self.id.clone(), self.attr.clone(), self.val.clone())
    }
}

/// Pointer identity of a shared WME, usable as a map key.
pub fn wme_ptr(w: &Rc<Wme>) -> usize {
    Rc::as_ptr(w) as usize
}

/// Pointer equality of two shared WMEs.
pub fn same_wme(a: &Rc<Wme>, b: &Rc<Wme>) -> bool {
    Rc::ptr_eq(a, b)
}

impl fmt::Display for Wme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.degree() {
            Some(mu) => write!(f, "({} {} {} ~{:.4})", self.id, self.attr, self.val, mu),
            None => write!(f, "({} {} {})", self.id, self.attr, self.val),
        }
    }
}

impl fmt::Debug for Wme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
