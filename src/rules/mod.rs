//! Rule inventory and stratification
//!
//! Productions arrive in source order, interleaved with `#stratum`
//! boundaries. The inventory keeps a current-stratum cursor that starts at
//! 0 and increments on each boundary; every production declared while
//! stratum *k* is open is appended both to stratum *k*'s list and to the
//! global declaration-order list. Rule names are unique across all strata;
//! a duplicate is a fatal load error.

use fnv::FnvHashMap;

use crate::error::{TenetError, TenetResult};
use crate::matcher::{Condition, ProductionId};
use crate::symbol::Symbol;

/// A compiled production: name, matcher handle, optional RHS pattern and
/// the stratum it was declared in.
pub struct ProductionSpec {
    pub name: Symbol,
    pub id: ProductionId,
    pub rhs: Option<Condition>,
    pub stratum: usize,
    /// Whether the LHS contains a negative condition. The driver uses this
    /// to report that a non-deterministic fixed point cannot be ruled out.
    pub nonmonotonic: bool,
}

/// The production inventory with its strata.
pub struct RuleBase {
    productions: Vec<ProductionSpec>,
    by_name: FnvHashMap<Symbol, usize>,
    by_handle: FnvHashMap<usize, usize>,
    strata: Vec<Vec<usize>>,
    cursor: usize,
}

impl Default for RuleBase {
    fn default() -> Self {
        RuleBase {
            productions: Vec::new(),
            by_name: FnvHashMap::default(),
            by_handle: FnvHashMap::default(),
            strata: vec![Vec::new()],
            cursor: 0,
        }
    }
}

impl RuleBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new stratum; subsequent productions belong to it.
    pub fn open_stratum(&mut self) {
        self.cursor += 1;
        self.strata.push(Vec::new());
    }

    /// The stratum new declarations currently land in.
    pub fn current_stratum(&self) -> usize {
        self.cursor
    }

    /// Number of strata opened so far (at least 1).
    pub fn stratum_count(&self) -> usize {
        self.strata.len()
    }

    /// Register a production in the current stratum. Fails on a duplicate
    /// name.
    pub fn add(
        &mut self,
        name: Symbol,
        id: ProductionId,
        rhs: Option<Condition>,
        nonmonotonic: bool,
    ) -> TenetResult<()> {
        if self.by_name.contains_key(&name) {
            return Err(TenetError::duplicate_rule(&name));
        }
        let index = self.productions.len();
        self.productions.push(ProductionSpec {
            name: name.clone(),
            id,
            rhs,
            stratum: self.cursor,
            nonmonotonic,
        });
        self.by_name.insert(name, index);
        self.by_handle.insert(id.0, index);
        self.strata[self.cursor].push(index);
        Ok(())
    }

    /// All productions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProductionSpec> {
        self.productions.iter()
    }

    /// Number of registered productions.
    pub fn len(&self) -> usize {
        self.productions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.productions.is_empty()
    }

    /// The production registered under a matcher handle.
    pub fn by_handle(&self, id: ProductionId) -> Option<&ProductionSpec> {
        self.by_handle.get(&id.0).map(|&i| &self.productions[i])
    }

    /// The production with the given name.
    pub fn by_name(&self, name: &Symbol) -> Option<&ProductionSpec> {
        self.by_name.get(name).map(|&i| &self.productions[i])
    }

    /// The stratum a matcher handle belongs to.
    pub fn stratum_of(&self, id: ProductionId) -> Option<usize> {
        self.by_handle(id).map(|spec| spec.stratum)
    }

    /// The productions of one stratum, in declaration order.
    pub fn stratum(&self, index: usize) -> impl Iterator<Item = &ProductionSpec> {
        self.strata
            .get(index)
            .into_iter()
            .flatten()
            .map(move |&i| &self.productions[i])
    }

    /// Whether any production's LHS can invalidate earlier conclusions.
    pub fn any_nonmonotonic(&self) -> bool {
        self.productions.iter().any(|p| p.nonmonotonic)
    }
}
