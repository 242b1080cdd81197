//! Condition patterns and variable bindings
//!
//! A condition is a `(id attr val)` pattern over symbols, variables and
//! wildcards. Negative conditions assert the absence of any matching WME.

use fnv::FnvHashMap;

use crate::symbol::Symbol;
use crate::wme::Wme;

/// One field of a condition pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CondTerm {
    /// A constant symbol that must match exactly.
    Constant(Symbol),
    /// A named variable, written `<name>` in the surface syntax.
    Variable(Symbol),
    /// The `_` wildcard: matches anything, binds nothing.
    Wildcard,
}

impl CondTerm {
    /// Whether this term is a variable.
    pub fn is_variable(&self) -> bool {
        matches!(self, CondTerm::Variable(_))
    }
}

/// Position of a field inside a WME triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Id,
    Attr,
    Val,
}

/// Variable bindings accumulated while joining conditions.
pub type Bindings = FnvHashMap<Symbol, Symbol>;

/// A single LHS condition or RHS pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Condition {
    pub id: CondTerm,
    pub attr: CondTerm,
    pub val: CondTerm,
    /// Negative conditions match when no WME satisfies the pattern.
    pub negative: bool,
}

impl Condition {
    pub fn positive(id: CondTerm, attr: CondTerm, val: CondTerm) -> Self {
        Condition {
            id,
            attr,
            val,
            negative: false,
        }
    }

    pub fn negative(id: CondTerm, attr: CondTerm, val: CondTerm) -> Self {
        Condition {
            id,
            attr,
            val,
            negative: true,
        }
    }

    /// The three fields in WME order.
    pub fn fields(&self) -> [(&CondTerm, Field); 3] {
        [
            (&self.id, Field::Id),
            (&self.attr, Field::Attr),
            (&self.val, Field::Val),
        ]
    }

    /// Try to match a WME under existing bindings, returning the extended
    /// bindings on success. Unbound variables bind to the WME's field;
    /// variables appearing inside negative conditions are treated as
    /// wildcards by the caller (no binding escapes a negation).
    pub fn match_wme(&self, wme: &Wme, bindings: &Bindings) -> Option<Bindings> {
        let mut out = bindings.clone();
        for (term, field) in self.fields() {
            let actual = match field {
                Field::Id => &wme.id,
                Field::Attr => &wme.attr,
                Field::Val => &wme.val,
            };
            match term {
                CondTerm::Constant(sym) => {
                    if sym != actual {
                        return None;
                    }
                }
                CondTerm::Variable(name) => match out.get(name) {
                    Some(bound) => {
                        if bound != actual {
                            return None;
                        }
                    }
                    None => {
                        out.insert(name.clone(), actual.clone());
                    }
                },
                CondTerm::Wildcard => {}
            }
        }
        Some(out)
    }

    /// Variables mentioned by this condition, in field order.
    pub fn variables(&self) -> Vec<Symbol> {
        self.fields()
            .into_iter()
            .filter_map(|(term, _)| match term {
                CondTerm::Variable(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

/// First-binding-site table for the variables of a production's positive
/// conditions. The index is the position of the condition among the
/// *positive* conditions, which is also the index of the corresponding WME
/// inside a token.
pub fn variable_locations(conditions: &[Condition]) -> FnvHashMap<Symbol, (usize, Field)> {
    let mut locations = FnvHashMap::default();
    let mut positive_index = 0;
    for cond in conditions {
        if cond.negative {
            continue;
        }
        for (term, field) in cond.fields() {
            if let CondTerm::Variable(name) = term {
                locations
                    .entry(name.clone())
                    .or_insert((positive_index, field));
            }
        }
        positive_index += 1;
    }
    locations
}
