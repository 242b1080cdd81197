//! Conflict-resolution strategies
//!
//! Given the conflict set produced by querying the matcher for each
//! production, a strategy selects at most one item to fire.
//!
//! `first-match` picks the first item in declaration order.
//!
//! `stratified-manual` walks the strata with a cursor that never moves
//! backwards within a run: it fires items from the current stratum while
//! any exist, then abandons the stratum permanently. Productions of an
//! abandoned stratum are ignored for the rest of the run even if later
//! activations re-enable them; this is what keeps default-logic rules from
//! chattering against their own conclusions.

use crate::matcher::{ProductionId, TokenDelta};
use crate::rules::RuleBase;

/// One entry of the conflict set: a production whose token delta is
/// non-empty, in declaration order.
pub struct ConflictItem {
    pub production: ProductionId,
    pub delta: TokenDelta,
}

/// Abstract conflict-resolution strategy.
pub trait Strategy {
    /// Name of this strategy as used by the selector.
    fn name(&self) -> &'static str;

    /// Reset per-run state. Called at the start of every `run()`.
    fn begin_run(&mut self) {}

    /// Pick the index of the conflict item to fire, or `None` to stop.
    fn select(&mut self, rules: &RuleBase, conflict_set: &[ConflictItem]) -> Option<usize>;
}

/// Fire the first activated production in declaration order.
#[derive(Debug, Default)]
pub struct FirstMatch;

impl Strategy for FirstMatch {
    fn name(&self) -> &'static str {
        "first-match"
    }

    fn select(&mut self, _rules: &RuleBase, conflict_set: &[ConflictItem]) -> Option<usize> {
        if conflict_set.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

/// Fire within the current stratum until it is exhausted, then move on and
/// never come back.
#[derive(Debug, Default)]
pub struct StratifiedManual {
    cursor: usize,
}

impl StratifiedManual {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stratum currently under consideration.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Strategy for StratifiedManual {
    fn name(&self) -> &'static str {
        "stratified-manual"
    }

    fn begin_run(&mut self) {
        self.cursor = 0;
    }

    fn select(&mut self, rules: &RuleBase, conflict_set: &[ConflictItem]) -> Option<usize> {
        loop {
            if self.cursor >= rules.stratum_count() {
                return None;
            }
            let found = conflict_set
                .iter()
                .position(|item| rules.stratum_of(item.production) == Some(self.cursor));
            if let Some(index) = found {
                return Some(index);
            }
            self.cursor += 1;
        }
    }
}

/// Names accepted by the strategy selector, in registry order.
pub const STRATEGY_NAMES: &[&str] = &["first-match", "stratified-manual"];

/// Resolve a user-supplied strategy name by case-insensitive prefix
/// matching over the registry. Returns `None` for names matching nothing;
/// the caller is expected to warn and fall back to first-match.
pub fn strategy_by_prefix(name: &str) -> Option<Box<dyn Strategy>> {
    let needle = name.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return None;
    }
    let matched = STRATEGY_NAMES.iter().find(|n| n.starts_with(&needle))?;
    match *matched {
        "first-match" => Some(Box::new(FirstMatch)),
        "stratified-manual" => Some(Box::new(StratifiedManual::new())),
        _ => None,
    }
}
