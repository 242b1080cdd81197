//! tenet - a truth-maintained production-rule reasoner
//!
//! A forward-chaining rule engine where every fact in working memory is
//! kept alive by explicit justifications, and retracting the last reason
//! for a fact cascades through everything derived from it.
//!
//! # Architecture
//!
//! - [`matcher`] - the pattern engine: working memory, per-production
//!   token deltas, RHS materialization, the fuzzy-variable registry
//! - [`tms`] - the justification store mapping each WME to the reasons
//!   that keep it alive
//! - [`rules`] - the production inventory with its declaration strata
//! - [`resolve`] - conflict-resolution strategies, including the
//!   stratified-manual strategy that tames default reasoning
//! - [`engine`] - the cycle driver mediating between all of the above
//! - [`fuzzy`] - membership degrees, degree propagation, and reversible
//!   sigmoid defuzzification producing TMS-justified crisp facts
//!
//! # Example
//!
//! ```rust
//! use tenet::{Engine, StratifiedManual};
//!
//! let mut engine = Engine::new();
//! engine.set_strategy(Box::new(StratifiedManual::new()));
//! engine
//!     .load_str(
//!         "(duck is-a bird)\n\
//!          (rule birds-fly (<s> is-a bird) => (<s> fly can))",
//!     )
//!     .unwrap();
//! let outcome = engine.run();
//! assert!(outcome.converged);
//! assert!(engine.matcher.find("duck", "fly", "can").is_some());
//! ```

pub mod chat;
pub mod config;
pub mod engine;
pub mod error;
pub mod explain;
pub mod fuzzy;
pub mod matcher;
pub mod parser;
pub mod resolve;
pub mod rules;
pub mod schema;
pub mod shell;
pub mod symbol;
pub mod tms;
pub mod wme;

// Re-export the core driver types
pub use engine::{Engine, QueryAnswer, RunOutcome, DEFAULT_MAX_CYCLES};

// Re-export error types
pub use error::{ErrorCode, TenetError, TenetResult};

// Re-export the data model
pub use matcher::{Bindings, CondTerm, Condition, Field, Matcher, ProductionId, TokenDelta};
pub use matcher::token::Token;
pub use symbol::{Interner, Symbol};
pub use wme::Wme;

// Re-export truth maintenance
pub use tms::{Justification, JustificationStore};

// Re-export rules and conflict resolution
pub use resolve::{strategy_by_prefix, ConflictItem, FirstMatch, Strategy, StratifiedManual};
pub use rules::{ProductionSpec, RuleBase};

// Re-export the fuzzy layer
pub use fuzzy::{FuzzyKind, FuzzySystem, FuzzyValueDef, FuzzyVariable};

// Re-export parsing
pub use parser::{parse_clauses, parse_directive, AstPattern, AstTerm, Clause, Directive,
    ParseError};

// Re-export supporting subsystems
pub use chat::{ChatClient, ChatConfig};
pub use config::TenetConfig;
pub use explain::explain_tree;
pub use schema::{SchemaChecker, SchemaPat, SchemaShape};
