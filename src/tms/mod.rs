//! Justification store
//!
//! Tracks, for every WME in working memory, the reasons that keep it alive.
//! The store's key set mirrors the matcher's working memory exactly: a
//! record exists iff the WME is live iff at least one justification remains.
//! Removing the last justification obliges the caller to remove the WME
//! from the matcher.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::matcher::token::{same_token, Token};
use crate::symbol::Symbol;
use crate::wme::{same_wme, wme_ptr, Wme};

/// A reason a WME is in working memory.
#[derive(Clone)]
pub enum Justification {
    /// Asserted directly by the program text or an interactive command.
    /// Every axiomatic assertion is a distinct reason: asserting the same
    /// fact twice leaves two axiomatic justifications, and retracting once
    /// leaves the fact live.
    Axiomatic,
    /// Derived by a production firing on a specific token.
    Production { rule: Symbol, token: Rc<Token> },
    /// Derived by defuzzifying the given fuzzy WMEs (ordered).
    Defuzzification { components: Vec<Rc<Wme>> },
    /// A fuzzy WME produced by fuzzifying a crisp numeric WME. The degree
    /// is the membership contributed at fuzzification time.
    Fuzzification { source: Rc<Wme>, degree: f64 },
}

impl Justification {
    /// Kind-and-payload equality. Production justifications compare by
    /// `(rule, token identity)`; defuzzification by the ordered component
    /// identities; fuzzification by source identity. Axiomatic
    /// justifications never compare equal (multiset semantics).
    pub fn same(&self, other: &Justification) -> bool {
        match (self, other) {
            (
                Justification::Production { rule: r1, token: t1 },
                Justification::Production { rule: r2, token: t2 },
            ) => r1 == r2 && same_token(t1, t2),
            (
                Justification::Defuzzification { components: c1 },
                Justification::Defuzzification { components: c2 },
            ) => c1.len() == c2.len() && c1.iter().zip(c2.iter()).all(|(a, b)| same_wme(a, b)),
            (
                Justification::Fuzzification { source: s1, .. },
                Justification::Fuzzification { source: s2, .. },
            ) => same_wme(s1, s2),
            _ => false,
        }
    }

    /// Whether the user may retract this justification directly.
    /// Production-derived and fuzzification reasons are never directly
    /// retractable.
    pub fn is_retractable(&self) -> bool {
        matches!(
            self,
            Justification::Axiomatic | Justification::Defuzzification { .. }
        )
    }
}

/// The live record for one WME.
pub struct WmeRecord {
    pub wme: Rc<Wme>,
    pub justifications: Vec<Justification>,
}

/// Maps each live WME to the reasons that keep it alive. Iteration follows
/// insertion order so cascades and explanations stay deterministic.
#[derive(Default)]
pub struct JustificationStore {
    records: IndexMap<usize, WmeRecord>,
}

impl JustificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a justification for a WME, creating the record if absent.
    /// Non-axiomatic reasons are deduplicated by [`Justification::same`].
    /// Returns whether the justification was actually appended.
    pub fn record(&mut self, wme: &Rc<Wme>, justification: Justification) -> bool {
        let record = self
            .records
            .entry(wme_ptr(wme))
            .or_insert_with(|| WmeRecord {
                wme: wme.clone(),
                justifications: Vec::new(),
            });
        if record.justifications.iter().any(|j| j.same(&justification)) {
            return false;
        }
        record.justifications.push(justification);
        true
    }

    /// Remove every justification of `wme` satisfying the predicate.
    /// Returns `true` iff the justification set became empty, in which case
    /// the record is dropped and the caller must remove the WME from the
    /// matcher.
    pub fn withdraw<F>(&mut self, wme: &Rc<Wme>, predicate: F) -> bool
    where
        F: Fn(&Justification) -> bool,
    {
        let key = wme_ptr(wme);
        let Some(record) = self.records.get_mut(&key) else {
            return false;
        };
        record.justifications.retain(|j| !predicate(j));
        if record.justifications.is_empty() {
            self.records.shift_remove(&key);
            true
        } else {
            false
        }
    }

    /// Remove one specific justification by position. Returns `true` iff the
    /// set became empty (record dropped).
    pub fn withdraw_at(&mut self, wme: &Rc<Wme>, index: usize) -> bool {
        let key = wme_ptr(wme);
        let Some(record) = self.records.get_mut(&key) else {
            return false;
        };
        if index < record.justifications.len() {
            record.justifications.remove(index);
        }
        if record.justifications.is_empty() {
            self.records.shift_remove(&key);
            true
        } else {
            false
        }
    }

    /// Index of one axiomatic or defuzzification justification, if any.
    pub fn find_retractable(&self, wme: &Rc<Wme>) -> Option<usize> {
        self.records
            .get(&wme_ptr(wme))
            .and_then(|r| r.justifications.iter().position(|j| j.is_retractable()))
    }

    /// Read-only view of a WME's justifications. Empty slice when the WME
    /// has no record.
    pub fn justifications_of(&self, wme: &Rc<Wme>) -> &[Justification] {
        self.records
            .get(&wme_ptr(wme))
            .map(|r| r.justifications.as_slice())
            .unwrap_or(&[])
    }

    /// Whether a record exists for the WME.
    pub fn contains(&self, wme: &Rc<Wme>) -> bool {
        self.records.contains_key(&wme_ptr(wme))
    }

    /// Drop a record outright (used when the matcher removes a WME through
    /// a path that already emptied the set).
    pub fn remove_record(&mut self, wme: &Rc<Wme>) {
        self.records.shift_remove(&wme_ptr(wme));
    }

    /// Iterate all live records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &WmeRecord> {
        self.records.values()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All WMEs whose record holds a production justification for the given
    /// rule and token. Used when a token is withdrawn.
    pub fn wmes_supported_by(&self, rule: &Symbol, token: &Rc<Token>) -> Vec<Rc<Wme>> {
        self.records
            .values()
            .filter(|r| {
                r.justifications.iter().any(|j| match j {
                    Justification::Production { rule: jr, token: jt } => {
                        jr == rule && same_token(jt, token)
                    }
                    _ => false,
                })
            })
            .map(|r| r.wme.clone())
            .collect()
    }
}
