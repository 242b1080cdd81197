//! Pattern-matching engine
//!
//! Owns working memory, production match state, and the fuzzy-variable
//! registry, and presents the contract the cycle driver is written
//! against:
//!
//! - `add_production` / `can_fire` / `will_fire` - per-production token
//!   deltas; `can_fire` is a read-only preview, `will_fire` commits.
//! - `materialize` - RHS assertion with variable substitution and an
//!   optional membership degree.
//! - `remove_wme`, `query`, working-memory enumeration.
//!
//! This is a straightforward delta-computing join matcher, not a RETE
//! network: each delta request re-joins the production's conditions
//! against working memory and diffs the result with the committed token
//! set. Committed tokens keep their identity across cycles; the driver and
//! the justification store compare them by pointer only.

pub mod condition;
pub mod token;

use std::rc::Rc;

use fnv::FnvHashMap;
use indexmap::IndexMap;

pub use condition::{variable_locations, Bindings, CondTerm, Condition, Field};
pub use token::{same_token, token_ptr, Token};

use crate::fuzzy::FuzzyVariable;
use crate::symbol::{Interner, Symbol};
use crate::wme::{same_wme, Wme};

/// Handle to a production registered with the matcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProductionId(pub usize);

/// Token additions and removals for one production since its last commit.
#[derive(Default)]
pub struct TokenDelta {
    pub to_add: Vec<Rc<Token>>,
    pub to_remove: Vec<Rc<Token>>,
}

impl TokenDelta {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Result of materializing assertion patterns: WMEs newly interned into
/// working memory versus WMEs that were already live. The two sets are
/// disjoint.
#[derive(Default)]
pub struct Materialized {
    pub added: Vec<Rc<Wme>>,
    pub existing: Vec<Rc<Wme>>,
}

struct ProductionMatch {
    name: Symbol,
    conditions: Vec<Condition>,
    committed: Vec<Rc<Token>>,
}

/// The pattern engine.
#[derive(Default)]
pub struct Matcher {
    interner: Interner,
    by_key: FnvHashMap<(Symbol, Symbol, Symbol), Rc<Wme>>,
    wmes: Vec<Rc<Wme>>,
    productions: Vec<ProductionMatch>,
    fuzzy_vars: IndexMap<Symbol, FuzzyVariable>,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string into this matcher's symbol table.
    pub fn intern(&mut self, s: &str) -> Symbol {
        self.interner.intern(s)
    }

    // ------------------------------------------------------------------
    // Working memory
    // ------------------------------------------------------------------

    /// Insert a crisp WME, returning the live WME and whether it was newly
    /// added.
    pub fn insert_crisp(&mut self, id: Symbol, attr: Symbol, val: Symbol) -> (Rc<Wme>, bool) {
        let key = (id.clone(), attr.clone(), val.clone());
        if let Some(existing) = self.by_key.get(&key) {
            return (existing.clone(), false);
        }
        let wme = Rc::new(Wme::new(id, attr, val));
        self.by_key.insert(key, wme.clone());
        self.wmes.push(wme.clone());
        (wme, true)
    }

    /// Insert a fuzzy WME with an initial degree. An already-live WME is
    /// returned untouched; degree reconciliation is the fuzzy layer's job.
    pub fn insert_fuzzy(
        &mut self,
        id: Symbol,
        attr: Symbol,
        val: Symbol,
        mu: f64,
    ) -> (Rc<Wme>, bool) {
        let key = (id.clone(), attr.clone(), val.clone());
        if let Some(existing) = self.by_key.get(&key) {
            return (existing.clone(), false);
        }
        let wme = Rc::new(Wme::fuzzy(id, attr, val, mu));
        self.by_key.insert(key, wme.clone());
        self.wmes.push(wme.clone());
        (wme, true)
    }

    /// Remove a WME from working memory. Tokens that held it surface in
    /// later `can_fire`/`will_fire` deltas; the matcher never cascades
    /// eagerly.
    pub fn remove_wme(&mut self, wme: &Rc<Wme>) {
        let key = wme.key();
        if self.by_key.get(&key).is_some_and(|live| same_wme(live, wme)) {
            self.by_key.remove(&key);
        }
        self.wmes.retain(|w| !same_wme(w, wme));
    }

    /// Look up a live WME structurally.
    pub fn find(&self, id: &str, attr: &str, val: &str) -> Option<Rc<Wme>> {
        let id = self.interner.get(id)?;
        let attr = self.interner.get(attr)?;
        let val = self.interner.get(val)?;
        self.by_key.get(&(id, attr, val)).cloned()
    }

    /// Enumerate working memory in insertion order.
    pub fn working_memory(&self) -> impl Iterator<Item = &Rc<Wme>> {
        self.wmes.iter()
    }

    /// Number of live WMEs.
    pub fn wme_count(&self) -> usize {
        self.wmes.len()
    }

    /// Drop all WMEs and committed tokens, keeping productions and the
    /// fuzzy registry. Backs the interactive `clear` command.
    pub fn reset_memory(&mut self) {
        self.by_key.clear();
        self.wmes.clear();
        for production in &mut self.productions {
            production.committed.clear();
        }
    }

    // ------------------------------------------------------------------
    // Productions and token deltas
    // ------------------------------------------------------------------

    /// Register a production's LHS. The returned handle is stable for the
    /// life of the matcher.
    pub fn add_production(&mut self, name: Symbol, conditions: Vec<Condition>) -> ProductionId {
        self.productions.push(ProductionMatch {
            name,
            conditions,
            committed: Vec::new(),
        });
        ProductionId(self.productions.len() - 1)
    }

    /// The production's LHS conditions.
    pub fn conditions_of(&self, id: ProductionId) -> &[Condition] {
        &self.productions[id.0].conditions
    }

    /// The production's name.
    pub fn name_of(&self, id: ProductionId) -> &Symbol {
        &self.productions[id.0].name
    }

    /// Number of registered productions.
    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    /// Preview the token delta for a production without committing it.
    pub fn can_fire(&self, id: ProductionId) -> TokenDelta {
        self.delta_for(id)
    }

    /// Commit and return the token delta for a production. Called exactly
    /// once per selected conflict item.
    pub fn will_fire(&mut self, id: ProductionId) -> TokenDelta {
        let delta = self.delta_for(id);
        let production = &mut self.productions[id.0];
        production
            .committed
            .retain(|t| !delta.to_remove.iter().any(|r| same_token(r, t)));
        production.committed.extend(delta.to_add.iter().cloned());
        delta
    }

    fn delta_for(&self, id: ProductionId) -> TokenDelta {
        let production = &self.productions[id.0];
        let current = self.join(&production.conditions);

        let mut delta = TokenDelta::default();
        for (wmes, _) in &current {
            let committed = production
                .committed
                .iter()
                .any(|t| same_sequence(&t.wmes, wmes));
            let pending = delta.to_add.iter().any(|t| same_sequence(&t.wmes, wmes));
            if !committed && !pending {
                delta.to_add.push(Rc::new(Token::new(wmes.clone())));
            }
        }
        for t in &production.committed {
            if !current.iter().any(|(wmes, _)| same_sequence(&t.wmes, wmes)) {
                delta.to_remove.push(t.clone());
            }
        }
        delta
    }

    /// Join a condition sequence against working memory. Each result pairs
    /// the matched WMEs (positive conditions only, in order) with the
    /// accumulated bindings.
    fn join(&self, conditions: &[Condition]) -> Vec<(Vec<Rc<Wme>>, Bindings)> {
        let mut partials: Vec<(Vec<Rc<Wme>>, Bindings)> =
            vec![(Vec::new(), Bindings::default())];
        for cond in conditions {
            if cond.negative {
                // Keep partials for which no WME satisfies the pattern;
                // free variables inside the negation are existential.
                partials.retain(|(_, bindings)| {
                    !self.wmes.iter().any(|w| cond.match_wme(w, bindings).is_some())
                });
            } else {
                let mut next = Vec::new();
                for (wmes, bindings) in &partials {
                    for w in &self.wmes {
                        if let Some(extended) = cond.match_wme(w, bindings) {
                            let mut seq = wmes.clone();
                            seq.push(w.clone());
                            next.push((seq, extended));
                        }
                    }
                }
                partials = next;
            }
            if partials.is_empty() {
                break;
            }
        }
        partials
    }

    /// Query working memory: all binding maps satisfying the conditions.
    pub fn query(&self, conditions: &[Condition]) -> Vec<Bindings> {
        self.join(conditions)
            .into_iter()
            .map(|(_, bindings)| bindings)
            .collect()
    }

    // ------------------------------------------------------------------
    // Materialization
    // ------------------------------------------------------------------

    /// Materialize assertion patterns under bindings. When a membership
    /// degree is supplied and the pattern's attribute names a registered
    /// fuzzy variable, the WME is created fuzzy with that degree.
    pub fn materialize(
        &mut self,
        patterns: &[Condition],
        bindings: &Bindings,
        mu: Option<f64>,
    ) -> Materialized {
        let mut out = Materialized::default();
        for pattern in patterns {
            let Some((id, attr, val)) = self.substitute(pattern, bindings) else {
                continue;
            };
            let fuzzy_target = mu.is_some() && self.fuzzy_vars.contains_key(&attr);
            let (wme, added) = if fuzzy_target {
                self.insert_fuzzy(id, attr, val, mu.unwrap_or(0.0))
            } else {
                self.insert_crisp(id, attr, val)
            };
            if added {
                out.added.push(wme);
            } else {
                out.existing.push(wme);
            }
        }
        out
    }

    fn substitute(
        &self,
        pattern: &Condition,
        bindings: &Bindings,
    ) -> Option<(Symbol, Symbol, Symbol)> {
        let mut resolved = Vec::with_capacity(3);
        for (term, _) in pattern.fields() {
            match term {
                CondTerm::Constant(sym) => resolved.push(sym.clone()),
                CondTerm::Variable(name) => match bindings.get(name) {
                    Some(value) => resolved.push(value.clone()),
                    None => {
                        eprintln!(
                            "tenet: warning: unbound variable <{}> in assertion pattern; \
                             skipping the assertion",
                            name
                        );
                        return None;
                    }
                },
                CondTerm::Wildcard => {
                    eprintln!(
                        "tenet: warning: `_` is not allowed in an assertion pattern; \
                         skipping the assertion"
                    );
                    return None;
                }
            }
        }
        let mut it = resolved.into_iter();
        Some((it.next()?, it.next()?, it.next()?))
    }

    // ------------------------------------------------------------------
    // Fuzzy-variable registry
    // ------------------------------------------------------------------

    /// Register a fuzzy variable. Re-registering a name replaces the
    /// binding.
    pub fn add_fuzzy_variable(&mut self, var: FuzzyVariable) {
        self.fuzzy_vars.insert(var.name.clone(), var);
    }

    /// The fuzzy variable registered under an attribute name, if any.
    pub fn get_fuzzy_variable(&self, attr: &Symbol) -> Option<&FuzzyVariable> {
        self.fuzzy_vars.get(attr)
    }

    /// All registered fuzzy variables in registration order.
    pub fn fuzzy_variables(&self) -> impl Iterator<Item = &FuzzyVariable> {
        self.fuzzy_vars.values()
    }
}

fn same_sequence(a: &[Rc<Wme>], b: &[Rc<Wme>]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| same_wme(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(m: &mut Matcher, id: &str, attr: &str, val: &str) -> Condition {
        Condition::positive(term(m, id), term(m, attr), term(m, val))
    }

    fn neg(m: &mut Matcher, id: &str, attr: &str, val: &str) -> Condition {
        Condition::negative(term(m, id), term(m, attr), term(m, val))
    }

    fn term(m: &mut Matcher, s: &str) -> CondTerm {
        if s == "_" {
            CondTerm::Wildcard
        } else if let Some(name) = s.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
            CondTerm::Variable(m.intern(name))
        } else {
            CondTerm::Constant(m.intern(s))
        }
    }

    fn assert_fact(m: &mut Matcher, id: &str, attr: &str, val: &str) -> Rc<Wme> {
        let (id, attr, val) = (m.intern(id), m.intern(attr), m.intern(val));
        m.insert_crisp(id, attr, val).0
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut m = Matcher::new();
        let a = assert_fact(&mut m, "duck", "is-a", "bird");
        let (b, added) = m.insert_crisp(a.id.clone(), a.attr.clone(), a.val.clone());
        assert!(!added);
        assert!(same_wme(&a, &b));
        assert_eq!(m.wme_count(), 1);
    }

    #[test]
    fn test_simple_delta_and_commit() {
        let mut m = Matcher::new();
        let name = m.intern("birds");
        let lhs = vec![cond(&mut m, "<s>", "is-a", "bird")];
        let p = m.add_production(name, lhs);

        assert!(m.can_fire(p).is_empty());

        assert_fact(&mut m, "duck", "is-a", "bird");
        assert_fact(&mut m, "robbin", "is-a", "bird");

        let delta = m.can_fire(p);
        assert_eq!(delta.to_add.len(), 2);
        assert!(delta.to_remove.is_empty());

        let committed = m.will_fire(p);
        assert_eq!(committed.to_add.len(), 2);
        assert!(m.can_fire(p).is_empty());
    }

    #[test]
    fn test_removal_surfaces_in_delta() {
        let mut m = Matcher::new();
        let name = m.intern("birds");
        let lhs = vec![cond(&mut m, "<s>", "is-a", "bird")];
        let p = m.add_production(name, lhs);

        let duck = assert_fact(&mut m, "duck", "is-a", "bird");
        let first = m.will_fire(p);
        assert_eq!(first.to_add.len(), 1);

        m.remove_wme(&duck);
        let delta = m.can_fire(p);
        assert!(delta.to_add.is_empty());
        assert_eq!(delta.to_remove.len(), 1);
        // The removed token is the committed one, by identity.
        assert!(same_token(&delta.to_remove[0], &first.to_add[0]));
    }

    #[test]
    fn test_negative_condition_blocks_and_unblocks() {
        let mut m = Matcher::new();
        let name = m.intern("may-fly");
        let lhs = vec![
            cond(&mut m, "<s>", "is-a", "bird"),
            neg(&mut m, "<s>", "fly", "_"),
        ];
        let p = m.add_production(name, lhs);

        assert_fact(&mut m, "duck", "is-a", "bird");
        assert_fact(&mut m, "duck", "fly", "can");
        assert_fact(&mut m, "robbin", "is-a", "bird");

        let delta = m.can_fire(p);
        assert_eq!(delta.to_add.len(), 1);
        assert_eq!(delta.to_add[0].wmes[0].id.as_ref(), "robbin");

        m.will_fire(p);

        // Asserting the blocked fact retracts the token.
        assert_fact(&mut m, "robbin", "fly", "can");
        let delta = m.can_fire(p);
        assert!(delta.to_add.is_empty());
        assert_eq!(delta.to_remove.len(), 1);
    }

    #[test]
    fn test_join_chains_bindings() {
        let mut m = Matcher::new();
        assert_fact(&mut m, "duck", "is-a", "bird");
        assert_fact(&mut m, "bird", "is-a", "animal");

        let conds = vec![
            cond(&mut m, "<x>", "is-a", "<y>"),
            cond(&mut m, "<y>", "is-a", "<z>"),
        ];
        let results = m.query(&conds);
        assert_eq!(results.len(), 1);
        let b = &results[0];
        assert_eq!(b.get(&m.intern("x")).unwrap().as_ref(), "duck");
        assert_eq!(b.get(&m.intern("z")).unwrap().as_ref(), "animal");
    }

    #[test]
    fn test_materialize_binds_variables() {
        let mut m = Matcher::new();
        let mut bindings = Bindings::default();
        bindings.insert(m.intern("s"), m.intern("robbin"));

        let pattern = cond(&mut m, "<s>", "fly", "can");
        let out = m.materialize(&[pattern.clone()], &bindings, None);
        assert_eq!(out.added.len(), 1);
        assert_eq!(out.added[0].id.as_ref(), "robbin");

        // Second materialization finds the existing WME.
        let out = m.materialize(&[pattern], &bindings, None);
        assert!(out.added.is_empty());
        assert_eq!(out.existing.len(), 1);
    }

    #[test]
    fn test_materialize_fuzzy_when_variable_registered() {
        use crate::fuzzy::{FuzzyKind, FuzzyValueDef, FuzzyVariable};

        let mut m = Matcher::new();
        let tip = m.intern("tip");
        let kind = Rc::new(FuzzyKind::new(
            m.intern("small-big"),
            vec![
                FuzzyValueDef {
                    name: m.intern("small"),
                    a: -0.8,
                    c: 10.0,
                },
                FuzzyValueDef {
                    name: m.intern("big"),
                    a: 0.8,
                    c: 10.0,
                },
            ],
        ));
        m.add_fuzzy_variable(FuzzyVariable::new(tip, kind));

        let mut bindings = Bindings::default();
        bindings.insert(m.intern("x"), m.intern("B1"));
        let pattern = cond(&mut m, "<x>", "tip", "big");

        let out = m.materialize(&[pattern], &bindings, Some(0.42));
        assert_eq!(out.added.len(), 1);
        assert_eq!(out.added[0].degree(), Some(0.42));
    }
}
