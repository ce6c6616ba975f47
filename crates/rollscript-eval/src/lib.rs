//! Rollscript evaluation engine.
//!
//! Evaluates expression trees from `rollscript-types` against an
//! [`EvaluationContext`]: dynamically typed values with coercion, lexical
//! scopes and closures, dice rolled from a seeded random stream, output
//! records and the distributions collected by sampling.
//!
//! ```text
//! Expr → [reduce] → EvaluationContext::evaluate → Value
//!                                ↘ records (roll / sample) → MultiCount table
//! ```
//!
//! [`run`] drives a whole program the way a command-line front end would.

mod assign;
mod coerce;
mod config;
mod context;
mod dice;
mod distribution;
mod error;
mod evaluator;
mod function;
mod import;
mod purity;
mod records;
mod reduce;
mod run;
mod score;
mod scope;
mod value;

pub use coerce::{to_function, SINGLETON_KEY};
pub use config::EvalConfig;
pub use context::EvaluationContext;
pub use dice::BULK_PARAMETER;
pub use distribution::{Count, CountSelector, Distribution, MultiCount};
pub use error::{EvalResult, EvaluationError, TraceEntry};
pub use function::{Function, OWNER_VARIABLE};
pub use import::{ImportCache, ImportChain, ImportResolver, MapImportResolver, NoImports};
pub use records::{DiceRecord, OutputRecord, RollRecord, SampleRecord};
pub use reduce::{output_name, reduce, reduce_all, substitute_variables, Reducer};
pub use run::{run, PreloadedImport, RunOptions, RunResult};
pub use score::{DistributionScore, ScoreValue};
pub use scope::Scope;
pub use value::{Value, ValueList, ValueMap};
