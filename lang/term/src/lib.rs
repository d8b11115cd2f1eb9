//! The term substrate of the kernel.
//!
//! Terms are immutable and hash-consed in an [Arena]: two terms are structurally
//! equal iff they are the same node. A [Term] is an owned handle (cloning retains
//! the node, dropping releases it); borrowed views are plain `&Term`. Global
//! rewrite rules live in the [RuleCollector], at most one per head declaration.

mod arena;
mod context;
mod evaluation;
mod hash;
mod names;
mod primitives;
mod print;
mod reduction;
mod rule;
mod typed_value;

pub use arena::*;
pub use context::*;
pub use evaluation::*;
pub use hash::*;
pub use names::*;
pub use primitives::*;
pub use reduction::*;
pub use rule::*;
pub use typed_value::*;
