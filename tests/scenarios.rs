//! End-to-end scenarios for the reasoner: default logic under
//! stratification, oscillation without it, retraction cascades, and the
//! fuzzy layer under both operator families.

use tenet::{Engine, FuzzySystem, Justification, StratifiedManual};

fn sigmoid(a: f64, c: f64, x: f64) -> f64 {
    1.0 / (1.0 + (-a * (x - c)).exp())
}

fn inverse_sigmoid(a: f64, c: f64, mu: f64) -> f64 {
    c - (1.0 / mu - 1.0).ln() / a
}

fn has_fact(engine: &Engine, id: &str, attr: &str, val: &str) -> bool {
    engine.matcher.find(id, attr, val).is_some()
}

const BIRDS: &str = "(duck is-a bird)\n\
    (robbin is-a bird)\n\
    (dodo is-a bird)\n\
    (duck fly can)\n\
    (dodo fly cannot)\n";

fn stratified_bird_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_strategy(Box::new(StratifiedManual::new()));
    engine
        .load_str(&format!(
            "{BIRDS}\
             #stratum\n\
             (rule may-fly (<s> is-a bird) -(<s> fly _) => (<s> fly-prepare can))\n\
             #stratum\n\
             (rule fly (<s> fly-prepare can) => (<s> fly can))"
        ))
        .unwrap();
    engine
}

#[test]
fn default_logic_stabilizes_under_stratification() {
    let mut engine = stratified_bird_engine();
    let outcome = engine.run();

    assert!(outcome.converged);
    // The bird with no explicit flying ability gets the default.
    assert!(has_fact(&engine, "robbin", "fly", "can"));
    assert!(has_fact(&engine, "robbin", "fly-prepare", "can"));
    // Explicit knowledge is untouched.
    assert!(has_fact(&engine, "duck", "fly", "can"));
    assert!(has_fact(&engine, "dodo", "fly", "cannot"));
    assert!(!has_fact(&engine, "dodo", "fly", "can"));
}

#[test]
fn default_logic_without_stratification_diverges() {
    let mut engine = Engine::new();
    engine.set_max_cycles(40);
    engine
        .load_str(&format!(
            "{BIRDS}\
             (rule may-fly (<s> is-a bird) -(<s> fly _) => (<s> fly can))"
        ))
        .unwrap();

    // Deriving (robbin fly can) defeats the rule's own negative condition,
    // so first-match alternately asserts and withdraws it until the cycle
    // limit is declared.
    let outcome = engine.run();
    assert!(!outcome.converged);
    assert_eq!(outcome.cycles, 40);
    assert!(engine.is_nondeterministic());
}

#[test]
fn retracting_an_axiom_cascades_and_restabilizes() {
    let mut engine = stratified_bird_engine();
    engine.run();
    assert!(has_fact(&engine, "robbin", "fly", "can"));

    // Both derived facts rest solely on (robbin is-a bird).
    engine.retract("robbin", "is-a", "bird").unwrap();
    assert!(!has_fact(&engine, "robbin", "is-a", "bird"));
    assert!(!has_fact(&engine, "robbin", "fly-prepare", "can"));
    assert!(!has_fact(&engine, "robbin", "fly", "can"));

    // Retracting duck's species leaves its axiomatic flying ability alone.
    engine.retract("duck", "is-a", "bird").unwrap();
    assert!(!has_fact(&engine, "duck", "is-a", "bird"));
    assert!(has_fact(&engine, "duck", "fly", "can"));

    // The store mirrors working memory after the cascades.
    assert_eq!(engine.store.len(), engine.matcher.wme_count());
    for wme in engine.matcher.working_memory() {
        assert!(!engine.store.justifications_of(wme).is_empty());
    }
}

#[test]
fn retraction_refused_without_retractable_justification() {
    let mut engine = stratified_bird_engine();
    engine.run();

    // Purely rule-derived facts cannot be retracted directly.
    assert!(engine.retract("robbin", "fly-prepare", "can").is_err());
    assert!(has_fact(&engine, "robbin", "fly-prepare", "can"));

    // Unknown facts are refused too.
    assert!(engine.retract("emu", "is-a", "bird").is_err());
}

const TIPPING_DECLARATIONS: &str = "\
    #fuzzy kind excellent-poor excellent:sigmoid 10 0.5, poor:sigmoid -10 0.5\n\
    #fuzzy kind small-big small:sigmoid -0.8 10, big:sigmoid 0.8 10\n\
    #fuzzy var food excellent-poor\n\
    #fuzzy var service excellent-poor\n\
    #fuzzy var tip small-big\n\
    (B1 food 0.3)\n\
    (B1 service 0.9)\n";

#[test]
fn fuzzy_min_max_tip() {
    let mut engine = Engine::new();
    engine
        .load_str(&format!(
            "#fuzzy system min-max\n\
             {TIPPING_DECLARATIONS}\
             (rule generous (<x> food excellent) (<x> service excellent) => (<x> tip big))"
        ))
        .unwrap();
    assert_eq!(engine.fuzzy_system(), FuzzySystem::MinMax);
    assert!(engine.run().converged);
    engine.defuzzify_and_cascade();

    let mu_food = sigmoid(10.0, 0.5, 0.3);
    let mu_service = sigmoid(10.0, 0.5, 0.9);
    let expected_mu = mu_food.min(mu_service);

    let tip = engine.matcher.find("B1", "tip", "big").expect("fuzzy tip");
    assert!((tip.degree().unwrap() - expected_mu).abs() < 1e-9);

    // Only `big` is asserted for the tip, so the crisp value is the single
    // inverse sigmoid of its degree.
    let expected_tip = inverse_sigmoid(0.8, 10.0, expected_mu);
    let crisp_tip = engine
        .matcher
        .working_memory()
        .find(|w| w.id.as_ref() == "B1" && w.attr.as_ref() == "tip" && !w.is_fuzzy())
        .cloned()
        .expect("crisp tip");
    assert!((crisp_tip.numeric_val().unwrap() - expected_tip).abs() < 1e-9);

    // The crisp tip is kept alive by its defuzzification reason alone.
    let reasons = engine.store.justifications_of(&crisp_tip);
    assert!(reasons
        .iter()
        .all(|j| matches!(j, Justification::Defuzzification { .. })));
}

#[test]
fn fuzzification_is_reversible_for_two_sided_kinds() {
    let mut engine = Engine::new();
    engine
        .load_str(&format!("#fuzzy system min-max\n{TIPPING_DECLARATIONS}"))
        .unwrap();
    engine.defuzzify_and_cascade();

    // Both fuzzy values were asserted for (B1 food); the defuzzification
    // mean of the two inverse sigmoids reproduces the crisp source:
    // ((c - ln(1/mu1 - 1)/a) + (c' - ln(1/mu2 - 1)/a')) / 2 = 0.3.
    let crisp = engine.matcher.find("B1", "food", "0.3").expect("crisp food");
    let reasons = engine.store.justifications_of(&crisp);
    assert!(reasons.iter().any(|j| matches!(j, Justification::Axiomatic)));
    assert!(reasons
        .iter()
        .any(|j| matches!(j, Justification::Defuzzification { .. })));

    // And no drifted replacement appeared next to it.
    let crisp_food_count = engine
        .matcher
        .working_memory()
        .filter(|w| w.id.as_ref() == "B1" && w.attr.as_ref() == "food" && !w.is_fuzzy())
        .count();
    assert_eq!(crisp_food_count, 1);
}

#[test]
fn fuzzy_multiplicative_disjunction_across_rules() {
    let mut engine = Engine::new();
    engine
        .load_str(&format!(
            "#fuzzy system multiplicative\n\
             {TIPPING_DECLARATIONS}\
             (rule generous-food (<x> food excellent) => (<x> tip big))\n\
             (rule generous-service (<x> service excellent) => (<x> tip big))"
        ))
        .unwrap();
    assert!(engine.run().converged);

    let mu_food = sigmoid(10.0, 0.5, 0.3);
    let mu_service = sigmoid(10.0, 0.5, 0.9);
    let expected = 1.0 - (1.0 - mu_food) * (1.0 - mu_service);

    let tip = engine.matcher.find("B1", "tip", "big").expect("fuzzy tip");
    assert!((tip.degree().unwrap() - expected).abs() < 1e-9);

    // Two production reasons keep it alive.
    let productions = engine
        .store
        .justifications_of(&tip)
        .iter()
        .filter(|j| matches!(j, Justification::Production { .. }))
        .count();
    assert_eq!(productions, 2);
}

#[test]
fn crisp_facts_survive_one_retraction_via_the_fuzzification_cycle() {
    let mut engine = Engine::new();
    engine
        .load_str(&format!(
            "#fuzzy system multiplicative\n\
             {TIPPING_DECLARATIONS}\
             (rule generous-food (<x> food excellent) => (<x> tip big))\n\
             (rule generous-service (<x> service excellent) => (<x> tip big))"
        ))
        .unwrap();
    engine.run();
    engine.defuzzify_and_cascade();

    // The crisp food fact fuzzified into (B1 food excellent/poor), and
    // defuzzifying those reproduced it: a justification cycle. Cycles are
    // never detected, so withdrawing the axiom leaves the fact supported
    // by its own defuzzification reason.
    engine.retract("B1", "food", "0.3").unwrap();
    assert!(has_fact(&engine, "B1", "food", "0.3"));
    assert!(has_fact(&engine, "B1", "food", "excellent"));

    // Withdrawing the defuzzification reason too breaks the cycle: the
    // crisp source dies and takes the fuzzified values with it.
    engine.retract("B1", "food", "0.3").unwrap();
    assert!(!has_fact(&engine, "B1", "food", "0.3"));
    assert!(!has_fact(&engine, "B1", "food", "excellent"));
    assert!(!has_fact(&engine, "B1", "food", "poor"));

    // The tip keeps only the service-derived production reason.
    let tip = engine.matcher.find("B1", "tip", "big").expect("fuzzy tip");
    let productions = engine
        .store
        .justifications_of(&tip)
        .iter()
        .filter(|j| matches!(j, Justification::Production { .. }))
        .count();
    assert_eq!(productions, 1);
}

#[test]
fn schema_warning_does_not_block_assertion() {
    let mut engine = Engine::new();
    engine
        .load_str(
            "#schemacheck on\n\
             #schema _ fly can\n\
             (duck fly canitreally)",
        )
        .unwrap();

    // The mismatching WME warned but was still added.
    assert!(has_fact(&engine, "duck", "fly", "canitreally"));
    assert!(engine.schema.is_enabled());
}

#[test]
fn query_after_stabilization() {
    let mut engine = stratified_bird_engine();
    engine.run();

    let clauses = tenet::parse_clauses("(query (<s> fly can))").unwrap();
    let tenet::Clause::Query { conditions } = &clauses[0] else {
        panic!("expected a query");
    };
    let answer = engine.query_ast(conditions);
    let text = answer.to_string();
    assert!(text.starts_with("Yes."));
    assert!(text.contains("||s:duck"));
    assert!(text.contains("||s:robbin"));
    assert!(!text.contains("||s:dodo"));
}

#[test]
fn explain_tree_shows_the_derivation_chain() {
    let mut engine = stratified_bird_engine();
    engine.run();

    let tree = engine.explain("robbin", "fly", "can").expect("live fact");
    assert!(tree.starts_with("(robbin fly can)"));
    assert!(tree.contains("[Rule: fly]"));
    assert!(tree.contains("(robbin fly-prepare can)"));
    assert!(tree.contains("[Rule: may-fly]"));
    assert!(tree.contains("(robbin is-a bird)"));
    assert!(tree.contains("[Axiomatic]"));
}

#[test]
fn explain_shows_fuzzification_sources() {
    let mut engine = Engine::new();
    engine
        .load_str(&format!("#fuzzy system min-max\n{TIPPING_DECLARATIONS}"))
        .unwrap();

    let tree = engine
        .explain("B1", "food", "excellent")
        .expect("fuzzified fact");
    assert!(tree.contains("[Fuzzification of: (B1 food 0.3)]"));
}
