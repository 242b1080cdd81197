//! Schema checking
//!
//! Warning-only validation of WME shapes. `#schema ID ATTR VAL` registers
//! a permitted shape for an attribute; `_` leaves a field unconstrained.
//! When checking is enabled and an attribute has registered shapes, an
//! asserted WME matching none of them produces a warning. The WME is
//! always added regardless.

use indexmap::IndexMap;

use crate::symbol::Symbol;
use crate::wme::Wme;

/// A schema field constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemaPat {
    Constant(Symbol),
    Any,
}

impl SchemaPat {
    fn matches(&self, sym: &Symbol) -> bool {
        match self {
            SchemaPat::Constant(c) => c == sym,
            SchemaPat::Any => true,
        }
    }
}

/// One permitted shape for an attribute.
#[derive(Clone, Debug)]
pub struct SchemaShape {
    pub id: SchemaPat,
    pub val: SchemaPat,
    pub description: Option<String>,
}

/// The shape registry, keyed by attribute.
#[derive(Debug, Default)]
pub struct SchemaChecker {
    enabled: bool,
    shapes: IndexMap<Symbol, Vec<SchemaShape>>,
}

impl SchemaChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle validation.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Register a permitted shape for an attribute.
    pub fn add_shape(&mut self, attr: Symbol, shape: SchemaShape) {
        self.shapes.entry(attr).or_default().push(shape);
    }

    /// Number of attributes with registered shapes.
    pub fn attr_count(&self) -> usize {
        self.shapes.len()
    }

    /// Validate a WME. Returns a warning message when checking is enabled,
    /// the attribute has registered shapes, and none of them matches.
    pub fn check(&self, wme: &Wme) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let shapes = self.shapes.get(&wme.attr)?;
        if shapes
            .iter()
            .any(|s| s.id.matches(&wme.id) && s.val.matches(&wme.val))
        {
            return None;
        }
        let permitted: Vec<String> = shapes
            .iter()
            .map(|s| {
                let field = |p: &SchemaPat| match p {
                    SchemaPat::Constant(c) => c.to_string(),
                    SchemaPat::Any => "_".to_string(),
                };
                format!("({} {} {})", field(&s.id), wme.attr, field(&s.val))
            })
            .collect();
        Some(format!(
            "{} does not match any registered schema for `{}`; permitted: {}",
            wme,
            wme.attr,
            permitted.join(", ")
        ))
    }
}
