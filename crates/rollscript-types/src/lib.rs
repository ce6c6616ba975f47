//! Shared types for the rollscript dice language.
//!
//! This crate defines the expression tree, source locations, the value
//! type vocabulary and canonical rendering of expressions back to source
//! text. It carries no runtime state; evaluation lives in `rollscript-eval`.

mod error;
mod location;
mod render;
mod value_type;
pub mod ast;

pub use error::ParseNameError;
pub use location::Location;
pub use render::Precedence;
pub use value_type::ValueType;
