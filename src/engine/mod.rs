//! Cycle driver and truth maintenance
//!
//! The driver owns every shared collection of the reasoner - matcher,
//! justification store, rule inventory, fuzzy-kind registry, schema
//! checker - and runs fire-assert-retract cycles to a fixed point:
//!
//! 1. Build the conflict set by previewing every production's token delta.
//! 2. Ask the strategy to select at most one item.
//! 3. Commit the selected production's delta (`will_fire`, exactly once),
//!    withdraw justifications for removed tokens, assert the RHS for added
//!    tokens, then defuzzify.
//!
//! Removals always precede assertions within a cycle, and cascades inside
//! the matcher surface as token deltas in *later* cycles; the driver never
//! recurses into itself.

use std::rc::Rc;

use fnv::FnvHashSet;
use indexmap::IndexMap;

use crate::error::{TenetError, TenetResult};
use crate::fuzzy::{
    defuzzify, propagate_degree, token_degree, FuzzyKind, FuzzySystem, FuzzyValueDef,
    FuzzyVariable,
};
use crate::matcher::{
    same_token, variable_locations, Bindings, CondTerm, Condition, Field, Matcher, ProductionId,
    Token,
};
use crate::parser::{
    parse_clauses, parse_directive, segments, AstPattern, AstTerm, Clause, Directive, SchemaTerm,
    Segment,
};
use crate::resolve::{ConflictItem, FirstMatch, Strategy};
use crate::rules::RuleBase;
use crate::schema::{SchemaChecker, SchemaPat, SchemaShape};
use crate::symbol::Symbol;
use crate::tms::{Justification, JustificationStore};
use crate::wme::{same_wme, Wme};

/// Default cycle limit per `run()`.
pub const DEFAULT_MAX_CYCLES: usize = 100;

/// Result of one `run()` to fixed point.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOutcome {
    /// Number of cycles that fired a production.
    pub cycles: usize,
    /// Whether a fixed point was reached before the cycle limit.
    pub converged: bool,
}

/// Answer to a query: the variables in first-occurrence order and every
/// satisfying binding.
pub struct QueryAnswer {
    pub variables: Vec<Symbol>,
    pub bindings: Vec<Bindings>,
}

impl std::fmt::Display for QueryAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.bindings.is_empty() {
            return write!(f, "No.");
        }
        write!(f, "Yes.")?;
        for (i, binding) in self.bindings.iter().enumerate() {
            for var in &self.variables {
                if let Some(value) = binding.get(var) {
                    write!(f, "\n{}||{}:{}", i, var, value)?;
                }
            }
        }
        Ok(())
    }
}

/// The reasoner context: all shared state, explicitly owned.
pub struct Engine {
    pub matcher: Matcher,
    pub store: JustificationStore,
    pub rules: RuleBase,
    pub schema: SchemaChecker,
    kinds: IndexMap<Symbol, Rc<FuzzyKind>>,
    system: FuzzySystem,
    strategy: Box<dyn Strategy>,
    max_cycles: usize,
    trace: bool,
    nondeterministic: bool,
    nondeterministic_reported: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Engine {
            matcher: Matcher::new(),
            store: JustificationStore::new(),
            rules: RuleBase::new(),
            schema: SchemaChecker::new(),
            kinds: IndexMap::new(),
            system: FuzzySystem::default(),
            strategy: Box::new(FirstMatch),
            max_cycles: DEFAULT_MAX_CYCLES,
            trace: false,
            nondeterministic: false,
            nondeterministic_reported: false,
        }
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the conflict-resolution strategy.
    pub fn set_strategy(&mut self, strategy: Box<dyn Strategy>) {
        self.strategy = strategy;
    }

    /// Name of the active strategy.
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn set_max_cycles(&mut self, max_cycles: usize) {
        self.max_cycles = max_cycles.max(1);
    }

    /// The active fuzzy operator family.
    pub fn fuzzy_system(&self) -> FuzzySystem {
        self.system
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Load a program: directives take effect immediately, clause batches
    /// between them execute in order. Parse errors are fatal; malformed
    /// directives warn and are ignored.
    pub fn load_str(&mut self, source: &str) -> TenetResult<()> {
        for segment in segments(source) {
            match segment {
                Segment::Directive(line) => match parse_directive(&line) {
                    Ok(directive) => self.apply_directive(directive),
                    Err(err) => {
                        eprintln!("tenet: warning: {}; ignoring directive", err);
                    }
                },
                Segment::Clauses(text) => {
                    let clauses =
                        parse_clauses(&text).map_err(|e| TenetError::parse(e.to_string()))?;
                    for clause in clauses {
                        self.execute_clause(clause)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_directive(&mut self, directive: Directive) {
        match directive {
            Directive::Stratum => self.rules.open_stratum(),
            Directive::SchemaCheck(enabled) => self.schema.set_enabled(enabled),
            Directive::Schema {
                id,
                attr,
                val,
                description,
            } => {
                let attr = self.matcher.intern(&attr);
                let shape = SchemaShape {
                    id: self.schema_pat(id),
                    val: self.schema_pat(val),
                    description,
                };
                self.schema.add_shape(attr, shape);
            }
            Directive::FuzzySystem(name) => match FuzzySystem::parse(&name) {
                Some(system) => self.system = system,
                None => eprintln!(
                    "tenet: warning: unrecognized fuzzy system `{}`; keeping {}",
                    name, self.system
                ),
            },
            Directive::FuzzyKind { name, values } => {
                let name = self.matcher.intern(&name);
                let defs: Vec<FuzzyValueDef> = values
                    .into_iter()
                    .map(|(value_name, a, c)| FuzzyValueDef {
                        name: self.matcher.intern(&value_name),
                        a,
                        c,
                    })
                    .collect();
                let kind = FuzzyKind::new(name.clone(), defs);
                if !kind.is_reversible() {
                    eprintln!(
                        "tenet: warning: fuzzy kind `{}` is not reversible \
                         (need exactly two sigmoids of opposite slope); ignoring",
                        name
                    );
                    return;
                }
                self.kinds.insert(name, Rc::new(kind));
            }
            Directive::FuzzyVar { name, kind } => {
                let Some(kind) = self.kinds.get(kind.as_str()).cloned() else {
                    eprintln!("tenet: warning: unknown fuzzy kind `{}`; ignoring", kind);
                    return;
                };
                let name = self.matcher.intern(&name);
                self.matcher.add_fuzzy_variable(FuzzyVariable::new(name, kind));
            }
        }
    }

    fn schema_pat(&mut self, term: SchemaTerm) -> SchemaPat {
        match term {
            SchemaTerm::Any => SchemaPat::Any,
            SchemaTerm::Constant(s) => SchemaPat::Constant(self.matcher.intern(&s)),
        }
    }

    /// Execute one parsed clause. Query answers print to stdout.
    pub fn execute_clause(&mut self, clause: Clause) -> TenetResult<()> {
        match clause {
            Clause::Assert { id, attr, val } => {
                self.assert_axiomatic(&id, &attr, &val);
                Ok(())
            }
            Clause::Rule { name, lhs, rhs } => self.add_rule(&name, &lhs, rhs.as_ref()),
            Clause::Query { conditions } => {
                self.run();
                self.defuzzify_and_cascade();
                let answer = self.query_ast(&conditions);
                println!("{}", answer);
                Ok(())
            }
        }
    }

    /// Compile and register a production.
    pub fn add_rule(
        &mut self,
        name: &str,
        lhs: &[AstPattern],
        rhs: Option<&AstPattern>,
    ) -> TenetResult<()> {
        let name = self.matcher.intern(name);
        let conditions: Vec<Condition> = lhs.iter().map(|p| self.compile_pattern(p)).collect();
        let rhs = rhs.map(|p| {
            if p.negative {
                eprintln!(
                    "tenet: warning: rule `{}` negates its assertion pattern; \
                     treating it as positive",
                    name
                );
            }
            let mut compiled = self.compile_pattern(p);
            compiled.negative = false;
            compiled
        });
        let nonmonotonic = conditions.iter().any(|c| c.negative);
        let id = self.matcher.add_production(name.clone(), conditions);
        self.rules.add(name, id, rhs, nonmonotonic)
    }

    fn compile_pattern(&mut self, pattern: &AstPattern) -> Condition {
        let term = |engine: &mut Engine, t: &AstTerm| match t {
            AstTerm::Constant(s) => CondTerm::Constant(engine.matcher.intern(s)),
            AstTerm::Variable(s) => CondTerm::Variable(engine.matcher.intern(s)),
            AstTerm::Wildcard => CondTerm::Wildcard,
        };
        Condition {
            id: term(self, &pattern.id),
            attr: term(self, &pattern.attr),
            val: term(self, &pattern.val),
            negative: pattern.negative,
        }
    }

    // ------------------------------------------------------------------
    // Assertion and fuzzification
    // ------------------------------------------------------------------

    /// Assert a fact with an axiomatic justification. A numeric value on a
    /// registered fuzzy variable additionally fuzzifies: one fuzzy WME per
    /// fuzzy value of the kind, each justified by the crisp source.
    pub fn assert_axiomatic(&mut self, id: &str, attr: &str, val: &str) -> Rc<Wme> {
        let id = self.matcher.intern(id);
        let attr = self.matcher.intern(attr);
        let val = self.matcher.intern(val);

        let (wme, _) = self.matcher.insert_crisp(id.clone(), attr.clone(), val);
        if let Some(warning) = self.schema.check(&wme) {
            eprintln!("tenet: warning: {}", warning);
        }
        self.store.record(&wme, Justification::Axiomatic);

        if let Some(x) = wme.numeric_val() {
            let kind = self
                .matcher
                .get_fuzzy_variable(&attr)
                .map(|v| v.kind.clone());
            if let Some(kind) = kind {
                for def in &kind.values {
                    let mu = def.membership(x);
                    let (fuzzy_wme, added) = self.matcher.insert_fuzzy(
                        id.clone(),
                        attr.clone(),
                        def.name.clone(),
                        mu,
                    );
                    self.store.record(
                        &fuzzy_wme,
                        Justification::Fuzzification {
                            source: wme.clone(),
                            degree: mu,
                        },
                    );
                    if !added {
                        let mut visited = FnvHashSet::default();
                        propagate_degree(&fuzzy_wme, &self.store, self.system, &mut visited);
                    }
                }
            }
        }
        wme
    }

    // ------------------------------------------------------------------
    // The cycle loop
    // ------------------------------------------------------------------

    /// Run fire-assert-retract cycles until the resolver cannot select or
    /// the cycle limit is hit.
    pub fn run(&mut self) -> RunOutcome {
        self.strategy.begin_run();
        if self.rules.any_nonmonotonic() {
            self.nondeterministic = true;
        }

        let mut outcome = RunOutcome::default();
        for cycle in 1..=self.max_cycles {
            let conflict_set = self.build_conflict_set();
            if conflict_set.is_empty() {
                outcome.converged = true;
                break;
            }
            let Some(index) = self.strategy.select(&self.rules, &conflict_set) else {
                outcome.converged = true;
                break;
            };
            let production = conflict_set[index].production;
            if self.trace {
                eprintln!(
                    "tenet: cycle {}: firing `{}`",
                    cycle,
                    self.matcher.name_of(production)
                );
            }
            self.apply(production);
            outcome.cycles = cycle;
        }

        if !outcome.converged {
            eprintln!(
                "tenet: warning: {}",
                TenetError::cycle_limit(self.max_cycles).message
            );
        }
        if self.nondeterministic && !self.nondeterministic_reported {
            self.nondeterministic_reported = true;
            eprintln!(
                "tenet: note: the rule set contains negated conditions; \
                 a non-deterministic fixed point cannot be ruled out"
            );
        }
        outcome
    }

    /// Whether the loaded rules put convergence in doubt.
    pub fn is_nondeterministic(&self) -> bool {
        self.nondeterministic
    }

    fn build_conflict_set(&self) -> Vec<ConflictItem> {
        let mut set = Vec::new();
        for spec in self.rules.iter() {
            let delta = self.matcher.can_fire(spec.id);
            if !delta.is_empty() {
                set.push(ConflictItem {
                    production: spec.id,
                    delta,
                });
            }
        }
        set
    }

    /// Fire one production: commit its delta, withdraw justifications for
    /// removed tokens, assert the RHS for added tokens, defuzzify.
    fn apply(&mut self, production: ProductionId) {
        let delta = self.matcher.will_fire(production);
        let rule_name = self.matcher.name_of(production).clone();

        // (a) Withdrawn tokens first.
        for token in &delta.to_remove {
            let affected = self.store.wmes_supported_by(&rule_name, token);
            for wme in affected {
                let emptied = self.store.withdraw(&wme, |j| match j {
                    Justification::Production { rule, token: jt } => {
                        *rule == rule_name && same_token(jt, token)
                    }
                    _ => false,
                });
                if emptied {
                    if self.trace {
                        eprintln!("tenet: retracting {} (no justification left)", wme);
                    }
                    self.remove_wme_cascade(&wme);
                }
            }
        }

        // (b) RHS assertions.
        let rhs = self
            .rules
            .by_handle(production)
            .and_then(|spec| spec.rhs.clone());
        let Some(rhs) = rhs else {
            return;
        };
        if delta.to_add.is_empty() {
            return;
        }

        let locations = variable_locations(self.matcher.conditions_of(production));
        for token in &delta.to_add {
            let Some(bindings) = bindings_from_token(token, &locations) else {
                eprintln!(
                    "tenet: warning: token for `{}` is shorter than its \
                     variable table; skipping the assertion",
                    rule_name
                );
                continue;
            };
            let mu = token_degree(token, self.system);
            let out = self.matcher.materialize(&[rhs.clone()], &bindings, mu);
            for wme in &out.added {
                if let Some(warning) = self.schema.check(wme) {
                    eprintln!("tenet: warning: {}", warning);
                }
                self.store.record(
                    wme,
                    Justification::Production {
                        rule: rule_name.clone(),
                        token: token.clone(),
                    },
                );
            }
            for wme in &out.existing {
                self.store.record(
                    wme,
                    Justification::Production {
                        rule: rule_name.clone(),
                        token: token.clone(),
                    },
                );
                if wme.is_fuzzy() {
                    let mut visited = FnvHashSet::default();
                    propagate_degree(wme, &self.store, self.system, &mut visited);
                }
            }
        }
        self.defuzzify_and_cascade();
    }

    // ------------------------------------------------------------------
    // Removal cascades
    // ------------------------------------------------------------------

    /// Remove a WME from working memory and run the withdrawal cascade
    /// for everything that depended on it.
    fn remove_wme_cascade(&mut self, wme: &Rc<Wme>) {
        self.matcher.remove_wme(wme);
        self.store.remove_record(wme);
        self.cascade_withdrawals(vec![wme.clone()]);
    }

    /// Drain a worklist of removed WMEs. For each one, every justification
    /// that depended on it directly is withdrawn: fuzzification reasons
    /// sourced from it and defuzzification reasons listing it as a
    /// component. A dependent that loses its last justification is removed
    /// and joins the worklist. Token-level consequences surface through
    /// the matcher in later cycles.
    fn cascade_withdrawals(&mut self, mut worklist: Vec<Rc<Wme>>) {
        while let Some(removed) = worklist.pop() {
            let depends = |j: &Justification| match j {
                Justification::Fuzzification { source, .. } => same_wme(source, &removed),
                Justification::Defuzzification { components } => {
                    components.iter().any(|c| same_wme(c, &removed))
                }
                _ => false,
            };
            let dependents: Vec<Rc<Wme>> = self
                .store
                .iter()
                .filter(|r| r.justifications.iter().any(|j| depends(j)))
                .map(|r| r.wme.clone())
                .collect();
            for dependent in dependents {
                if self.store.withdraw(&dependent, |j| depends(j)) {
                    if self.trace {
                        eprintln!("tenet: retracting {} (no justification left)", dependent);
                    }
                    self.matcher.remove_wme(&dependent);
                    worklist.push(dependent);
                }
            }
        }
    }

    /// One defuzzification pass plus the withdrawal cascade for any crisp
    /// WMEs it displaced.
    pub fn defuzzify_and_cascade(&mut self) {
        let removed = defuzzify(&mut self.matcher, &mut self.store);
        self.cascade_withdrawals(removed);
    }

    // ------------------------------------------------------------------
    // Interactive mutation
    // ------------------------------------------------------------------

    /// Retract one axiomatic or defuzzification justification of a fact,
    /// then re-stabilize the knowledge base.
    pub fn retract(&mut self, id: &str, attr: &str, val: &str) -> TenetResult<()> {
        let Some(wme) = self.matcher.find(id, attr, val) else {
            return Err(TenetError::retraction(format!(
                "({} {} {}) is not in working memory",
                id, attr, val
            )));
        };
        let Some(index) = self.store.find_retractable(&wme) else {
            return Err(TenetError::retraction(format!(
                "{} has no axiomatic or defuzzification justification",
                wme
            )));
        };
        if self.store.withdraw_at(&wme, index) {
            self.remove_wme_cascade(&wme);
        }
        self.defuzzify_and_cascade();
        self.run();
        self.defuzzify_and_cascade();
        Ok(())
    }

    /// Drop every fact and justification. Rules, strata, schemas and the
    /// fuzzy registry persist.
    pub fn clear(&mut self) {
        self.matcher.reset_memory();
        self.store = JustificationStore::new();
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Answer a query over the current working memory.
    pub fn query_ast(&mut self, conditions: &[AstPattern]) -> QueryAnswer {
        let compiled: Vec<Condition> = conditions.iter().map(|p| self.compile_pattern(p)).collect();
        let mut variables: Vec<Symbol> = Vec::new();
        for condition in &compiled {
            for var in condition.variables() {
                if !variables.contains(&var) {
                    variables.push(var);
                }
            }
        }
        let bindings = self.matcher.query(&compiled);
        QueryAnswer {
            variables,
            bindings,
        }
    }

    /// Render the justification tree for a fact, if it is live.
    pub fn explain(&self, id: &str, attr: &str, val: &str) -> Option<String> {
        let wme = self.matcher.find(id, attr, val)?;
        Some(crate::explain::explain_tree(&wme, &self.store))
    }
}

/// Bind RHS variables from a token using the production's variable-location
/// table. `None` when the table points past the token (data inconsistency).
fn bindings_from_token(
    token: &Rc<Token>,
    locations: &fnv::FnvHashMap<Symbol, (usize, Field)>,
) -> Option<Bindings> {
    let mut bindings = Bindings::default();
    for (var, &(index, field)) in locations {
        let wme = token.wmes.get(index)?;
        let value = match field {
            Field::Id => wme.id.clone(),
            Field::Attr => wme.attr.clone(),
            Field::Val => wme.val.clone(),
        };
        bindings.insert(var.clone(), value);
    }
    Some(bindings)
}
