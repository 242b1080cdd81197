//! Fuzzy inference layer
//!
//! Implements the degree arithmetic of the reasoner:
//! - conjunction/disjunction operator families (min-max, multiplicative)
//! - two-sided sigmoid fuzzy-variable kinds with exact inverses
//! - token membership degrees (conjunction over a token's fuzzy WMEs)
//! - degree propagation across alternative justifications
//! - defuzzification of fuzzy WMEs into TMS-justified crisp WMEs
//!
//! Only reversible kinds are supported: exactly two sigmoid values with
//! opposite slope signs. Solving mu(x) = target is then well defined and
//! the crisp value is the mean of the two inverse-sigmoid contributions.

use std::rc::Rc;

use fnv::FnvHashSet;
use indexmap::IndexMap;

use crate::matcher::Matcher;
use crate::symbol::Symbol;
use crate::tms::{Justification, JustificationStore};
use crate::wme::{same_wme, wme_ptr, Wme};

/// Crisp values closer than this are not replaced during defuzzification.
pub const CRISP_REPLACE_EPSILON: f64 = 1e-6;

/// Guard band keeping the inverse sigmoid finite at mu = 0 and mu = 1.
const MU_CLAMP: f64 = 1e-9;

/// The conjunction/disjunction operator family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FuzzySystem {
    /// conj = min, disj = max.
    #[default]
    MinMax,
    /// conj = product, disj = 1 - prod(1 - mu).
    Multiplicative,
}

impl FuzzySystem {
    /// Parse an operator-family name as written in `#fuzzy system`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "min-max" | "minmax" => Some(FuzzySystem::MinMax),
            "multiplicative" => Some(FuzzySystem::Multiplicative),
            _ => None,
        }
    }

    /// Combine degrees conjunctively. `None` on an empty input.
    pub fn conjunction(&self, degrees: impl IntoIterator<Item = f64>) -> Option<f64> {
        let mut iter = degrees.into_iter();
        let first = iter.next()?;
        Some(match self {
            FuzzySystem::MinMax => iter.fold(first, f64::min),
            FuzzySystem::Multiplicative => iter.fold(first, |acc, mu| acc * mu),
        })
    }

    /// Combine degrees disjunctively. `None` on an empty input.
    pub fn disjunction(&self, degrees: impl IntoIterator<Item = f64>) -> Option<f64> {
        let mut iter = degrees.into_iter();
        let first = iter.next()?;
        Some(match self {
            FuzzySystem::MinMax => iter.fold(first, f64::max),
            FuzzySystem::Multiplicative => {
                1.0 - iter.fold(1.0 - first, |acc, mu| acc * (1.0 - mu))
            }
        })
    }
}

impl std::fmt::Display for FuzzySystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FuzzySystem::MinMax => write!(f, "min-max"),
            FuzzySystem::Multiplicative => write!(f, "multiplicative"),
        }
    }
}

/// One fuzzy value of a kind: a named sigmoid mu(x) = 1/(1 + e^(-a(x-c))).
#[derive(Clone, Debug)]
pub struct FuzzyValueDef {
    pub name: Symbol,
    pub a: f64,
    pub c: f64,
}

impl FuzzyValueDef {
    /// Membership degree of a crisp value.
    pub fn membership(&self, x: f64) -> f64 {
        1.0 / (1.0 + (-self.a * (x - self.c)).exp())
    }

    /// Inverse sigmoid: the crisp x with membership `mu`. The degree is
    /// clamped away from 0 and 1 to keep the logarithm finite.
    pub fn inverse(&self, mu: f64) -> f64 {
        let mu = mu.clamp(MU_CLAMP, 1.0 - MU_CLAMP);
        self.c - (1.0 / mu - 1.0).ln() / self.a
    }
}

/// A named fuzzy-variable kind: an ordered list of fuzzy-value sigmoids.
#[derive(Clone, Debug)]
pub struct FuzzyKind {
    pub name: Symbol,
    pub values: Vec<FuzzyValueDef>,
}

impl FuzzyKind {
    pub fn new(name: Symbol, values: Vec<FuzzyValueDef>) -> Self {
        FuzzyKind { name, values }
    }

    /// The value definition with the given name.
    pub fn value_named(&self, name: &Symbol) -> Option<&FuzzyValueDef> {
        self.values.iter().find(|v| &v.name == name)
    }

    /// A kind is reversible iff it declares exactly two sigmoids of
    /// opposite slope sign. Only reversible kinds can be defuzzified.
    pub fn is_reversible(&self) -> bool {
        self.values.len() == 2 && self.values[0].a * self.values[1].a < 0.0
    }
}

/// A fuzzy variable: an attribute name bound to a kind.
#[derive(Clone, Debug)]
pub struct FuzzyVariable {
    pub name: Symbol,
    pub kind: Rc<FuzzyKind>,
}

impl FuzzyVariable {
    pub fn new(name: Symbol, kind: Rc<FuzzyKind>) -> Self {
        FuzzyVariable { name, kind }
    }
}

/// Membership degree of a token: conjunction over its fuzzy members.
/// `None` when the token holds no fuzzy WME.
pub fn token_degree(token: &crate::matcher::token::Token, system: FuzzySystem) -> Option<f64> {
    system.conjunction(token.fuzzy_members().filter_map(|w| w.degree()))
}

/// Format a crisp value for assertion into working memory.
pub fn format_crisp(x: f64) -> String {
    x.to_string()
}

/// Recompute the degree of a fuzzy WME from all of its justifications:
/// the disjunction over the defined token degrees of its production
/// justifications and the base degrees of its fuzzification justifications.
/// Degree changes ripple to fuzzy WMEs supported by tokens containing `wme`;
/// the visited set prevents re-entrance on the same WME within one
/// propagation.
pub fn propagate_degree(
    wme: &Rc<Wme>,
    store: &JustificationStore,
    system: FuzzySystem,
    visited: &mut FnvHashSet<usize>,
) {
    if !wme.is_fuzzy() || !visited.insert(wme_ptr(wme)) {
        return;
    }

    let justifications = store.justifications_of(wme);
    if justifications.is_empty() {
        eprintln!(
            "tenet: warning: {} has no recorded justification during degree \
             propagation; the justification store is inconsistent",
            wme
        );
        return;
    }

    let contributions: Vec<f64> = justifications
        .iter()
        .filter_map(|j| match j {
            Justification::Production { token, .. } => token_degree(token, system),
            Justification::Fuzzification { degree, .. } => Some(*degree),
            _ => None,
        })
        .collect();

    let Some(new_mu) = system.disjunction(contributions) else {
        return;
    };
    let old_mu = wme.degree().unwrap_or(0.0);
    if (new_mu - old_mu).abs() <= f64::EPSILON {
        return;
    }
    wme.set_degree(new_mu);

    // Ripple to fuzzy WMEs whose supporting tokens include this one.
    let downstream: Vec<Rc<Wme>> = store
        .iter()
        .filter(|r| r.wme.is_fuzzy() && !same_wme(&r.wme, wme))
        .filter(|r| {
            r.justifications.iter().any(|j| match j {
                Justification::Production { token, .. } => token.contains(wme),
                _ => false,
            })
        })
        .map(|r| r.wme.clone())
        .collect();
    for d in downstream {
        propagate_degree(&d, store, system, visited);
    }
}

/// One defuzzification pass over every registered fuzzy variable.
///
/// For each `(id, attr)` group of live fuzzy WMEs, computes the crisp value
/// as the mean of the inverse-sigmoid contributions, replaces a single
/// existing crisp WME when it drifted by at least [`CRISP_REPLACE_EPSILON`],
/// and asserts the crisp WME with a defuzzification justification naming
/// the group. Returns the WMEs removed from working memory so the driver
/// can cascade dependent withdrawals.
pub fn defuzzify(matcher: &mut Matcher, store: &mut JustificationStore) -> Vec<Rc<Wme>> {
    let variables: Vec<(Symbol, Rc<FuzzyKind>)> = matcher
        .fuzzy_variables()
        .map(|v| (v.name.clone(), v.kind.clone()))
        .collect();

    let mut removed = Vec::new();

    for (attr, kind) in variables {
        // Group live WMEs for this attribute by id, fuzzy and crisp apart.
        let mut fuzzy_groups: IndexMap<Symbol, Vec<Rc<Wme>>> = IndexMap::new();
        let mut crisp_groups: IndexMap<Symbol, Vec<Rc<Wme>>> = IndexMap::new();
        for w in matcher.working_memory() {
            if w.attr != attr {
                continue;
            }
            if w.is_fuzzy() {
                fuzzy_groups.entry(w.id.clone()).or_default().push(w.clone());
            } else if w.numeric_val().is_some() {
                crisp_groups.entry(w.id.clone()).or_default().push(w.clone());
            }
        }

        for (id, members) in fuzzy_groups {
            let mut xs = Vec::with_capacity(members.len());
            for m in &members {
                match kind.value_named(&m.val) {
                    Some(def) => xs.push(def.inverse(m.degree().unwrap_or(0.0))),
                    None => eprintln!(
                        "tenet: warning: fuzzy value `{}` is not declared by kind `{}`; \
                         skipping it during defuzzification",
                        m.val, kind.name
                    ),
                }
            }
            if xs.is_empty() {
                continue;
            }
            let x_star = xs.iter().sum::<f64>() / xs.len() as f64;

            let existing = crisp_groups.get(&id).cloned().unwrap_or_default();
            let mut target_val: Option<Symbol> = None;
            match existing.len() {
                0 => {}
                1 => {
                    let old = &existing[0];
                    // numeric_val is Some by construction of crisp_groups
                    let n = old.numeric_val().unwrap_or(f64::NAN);
                    if (n - x_star).abs() >= CRISP_REPLACE_EPSILON {
                        let emptied = store
                            .withdraw(old, |j| matches!(j, Justification::Defuzzification { .. }));
                        if emptied {
                            matcher.remove_wme(old);
                            removed.push(old.clone());
                        }
                    } else {
                        // Close enough: keep the existing spelling.
                        target_val = Some(old.val.clone());
                    }
                }
                n => {
                    eprintln!(
                        "tenet: warning: {} crisp values present for ({} {}); \
                         not replacing any of them",
                        n, id, attr
                    );
                }
            }

            let val_sym = match target_val {
                Some(v) => v,
                None => matcher.intern(&format_crisp(x_star)),
            };
            let (crisp, _) = matcher.insert_crisp(id.clone(), attr.clone(), val_sym);
            store.record(
                &crisp,
                Justification::Defuzzification {
                    components: members.clone(),
                },
            );
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::token::Token;
    use crate::symbol::Interner;

    #[test]
    fn test_sigmoid_and_inverse_roundtrip() {
        let mut i = Interner::new();
        let def = FuzzyValueDef {
            name: i.intern("excellent"),
            a: 10.0,
            c: 0.5,
        };
        for x in [0.1, 0.3, 0.5, 0.8] {
            let mu = def.membership(x);
            assert!((def.inverse(mu) - x).abs() < 1e-9);
        }
    }

    #[test]
    fn test_inverse_is_finite_at_extremes() {
        let mut i = Interner::new();
        let def = FuzzyValueDef {
            name: i.intern("big"),
            a: 5.0,
            c: 10.0,
        };
        assert!(def.inverse(0.0).is_finite());
        assert!(def.inverse(1.0).is_finite());
    }

    #[test]
    fn test_min_max_operators() {
        let sys = FuzzySystem::MinMax;
        assert_eq!(sys.conjunction([0.6, 0.4, 0.9]), Some(0.4));
        assert_eq!(sys.disjunction([0.6, 0.4, 0.9]), Some(0.9));
        assert_eq!(sys.conjunction(std::iter::empty()), None);
    }

    #[test]
    fn test_multiplicative_operators() {
        let sys = FuzzySystem::Multiplicative;
        let conj = sys.conjunction([0.6, 0.5]).unwrap();
        assert!((conj - 0.3).abs() < 1e-12);
        let disj = sys.disjunction([0.6, 0.5]).unwrap();
        assert!((disj - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_system_parse() {
        assert_eq!(FuzzySystem::parse("min-max"), Some(FuzzySystem::MinMax));
        assert_eq!(
            FuzzySystem::parse("Multiplicative"),
            Some(FuzzySystem::Multiplicative)
        );
        assert_eq!(FuzzySystem::parse("centroid"), None);
    }

    #[test]
    fn test_kind_reversibility() {
        let mut i = Interner::new();
        let rev = FuzzyKind::new(
            i.intern("excellent-poor"),
            vec![
                FuzzyValueDef {
                    name: i.intern("excellent"),
                    a: 10.0,
                    c: 0.5,
                },
                FuzzyValueDef {
                    name: i.intern("poor"),
                    a: -10.0,
                    c: 0.5,
                },
            ],
        );
        assert!(rev.is_reversible());

        let same_slope = FuzzyKind::new(
            i.intern("bad"),
            vec![
                FuzzyValueDef {
                    name: i.intern("x"),
                    a: 1.0,
                    c: 0.0,
                },
                FuzzyValueDef {
                    name: i.intern("y"),
                    a: 2.0,
                    c: 0.0,
                },
            ],
        );
        assert!(!same_slope.is_reversible());
    }

    #[test]
    fn test_token_degree_conjunction() {
        let mut i = Interner::new();
        let crisp = Rc::new(Wme::new(i.intern("B1"), i.intern("is-a"), i.intern("bill")));
        let f1 = Rc::new(Wme::fuzzy(
            i.intern("B1"),
            i.intern("food"),
            i.intern("excellent"),
            0.7,
        ));
        let f2 = Rc::new(Wme::fuzzy(
            i.intern("B1"),
            i.intern("service"),
            i.intern("excellent"),
            0.4,
        ));

        let token = Token::new(vec![crisp.clone(), f1, f2]);
        assert_eq!(token_degree(&token, FuzzySystem::MinMax), Some(0.4));

        let no_fuzzy = Token::new(vec![crisp]);
        assert_eq!(token_degree(&no_fuzzy, FuzzySystem::MinMax), None);
    }

    #[test]
    fn test_propagation_disjoins_token_degrees() {
        let mut i = Interner::new();
        let mut store = JustificationStore::new();

        let f1 = Rc::new(Wme::fuzzy(
            i.intern("B1"),
            i.intern("food"),
            i.intern("excellent"),
            0.6,
        ));
        let f2 = Rc::new(Wme::fuzzy(
            i.intern("B1"),
            i.intern("service"),
            i.intern("excellent"),
            0.5,
        ));
        let derived = Rc::new(Wme::fuzzy(
            i.intern("B1"),
            i.intern("tip"),
            i.intern("big"),
            0.0,
        ));

        let t1 = Rc::new(Token::new(vec![f1.clone()]));
        let t2 = Rc::new(Token::new(vec![f2.clone()]));
        store.record(
            &derived,
            Justification::Production {
                rule: i.intern("r1"),
                token: t1,
            },
        );
        store.record(
            &derived,
            Justification::Production {
                rule: i.intern("r2"),
                token: t2,
            },
        );

        let mut visited = FnvHashSet::default();
        propagate_degree(&derived, &store, FuzzySystem::Multiplicative, &mut visited);

        // 1 - (1 - 0.6)(1 - 0.5) = 0.8
        assert!((derived.degree().unwrap() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_propagation_keeps_fuzzification_base() {
        let mut i = Interner::new();
        let mut store = JustificationStore::new();

        let source = Rc::new(Wme::new(i.intern("B1"), i.intern("food"), i.intern("0.3")));
        let fuzzy = Rc::new(Wme::fuzzy(
            i.intern("B1"),
            i.intern("food"),
            i.intern("excellent"),
            0.2,
        ));
        store.record(
            &fuzzy,
            Justification::Fuzzification {
                source,
                degree: 0.2,
            },
        );

        let supporting = Rc::new(Wme::fuzzy(
            i.intern("B1"),
            i.intern("mood"),
            i.intern("good"),
            0.9,
        ));
        let token = Rc::new(Token::new(vec![supporting]));
        store.record(
            &fuzzy,
            Justification::Production {
                rule: i.intern("r"),
                token,
            },
        );

        let mut visited = FnvHashSet::default();
        propagate_degree(&fuzzy, &store, FuzzySystem::MinMax, &mut visited);
        assert!((fuzzy.degree().unwrap() - 0.9).abs() < 1e-12);
    }
}
