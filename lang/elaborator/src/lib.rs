//! Elaboration of instruction trees.
//!
//! A host builds a [Program] of commands over typed terms, embeds the values it
//! wants the program to see and hands it to a [Session]. The [evaluator] walks
//! the program, turning every use of a value at a type that is not obviously its
//! own into a cast for the solver; rules are compiled by the [pattern] module
//! into match programs whose side conditions are solved before the rule is
//! installed. All problems end up as [ElabError]s on the session.

mod instructions;

pub mod evaluator;
pub mod pattern;
pub mod result;
mod session;

pub use evaluator::{EvaluatorInterface, VariableExplanation, evaluate};
pub use instructions::*;
pub use result::{ElabError, ElabResult};
pub use session::Session;
