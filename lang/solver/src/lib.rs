//! Equation solving over the term substrate.
//!
//! A [Stack] is a dependent telescope encoded by a pair of terms; an [Equation]
//! asks whether two terms are definitionally equal below a stack. The [Solver]
//! advances a single equation by one deduction, and the [Manager] owns all live
//! equations, drives them to a fixpoint and settles the [Future]s handed out for
//! equations, casts and rule derivations.

mod equation;
mod future;
mod manager;
mod obligations;
mod report;
mod solver;
mod stack;

pub use equation::*;
pub use future::*;
pub use manager::*;
pub use obligations::*;
pub use report::*;
pub use solver::*;
pub use stack::*;
