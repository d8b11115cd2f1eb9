use kiln_lang_term::{Rule, Term};

use crate::{EquationReport, Future, Stack};

/// Outcome of an equation, settled by the manager.
#[derive(Debug, Clone)]
pub enum EquationResult {
    Solved,
    /// The equation failed, or was still undecided when the manager was closed.
    Failed(EquationReport),
}

impl EquationResult {
    pub fn is_solved(&self) -> bool {
        matches!(self, EquationResult::Solved)
    }

    pub fn report(&self) -> Option<&EquationReport> {
        match self {
            EquationResult::Solved => None,
            EquationResult::Failed(report) => Some(report),
        }
    }
}

/// `variable` stands for `source` retyped from `source_type` to `target_type`.
///
/// Once the two types are proven equal the manager installs
/// `variable $0 .. $(depth - 1) := source`.
#[derive(Debug, Clone)]
pub struct Cast {
    pub stack: Stack,
    pub variable: Term,
    pub source_type: Term,
    pub source: Term,
    pub target_type: Term,
}

/// The two casts needed to apply a term that is not known to be a function.
///
/// First `function_type ≡ expected_function_type` is solved and
/// `function_variable := function_value` installed; then
/// `argument_type ≡ expected_argument_type` and
/// `argument_variable := argument_value`.
#[derive(Debug, Clone)]
pub struct FunctionCast {
    pub stack: Stack,
    pub function_variable: Term,
    pub function_type: Term,
    pub function_value: Term,
    pub expected_function_type: Term,
    pub argument_variable: Term,
    pub argument_type: Term,
    pub argument_value: Term,
    pub expected_argument_type: Term,
}

#[derive(Debug, Clone)]
pub struct FunctionCastResult {
    pub result: EquationResult,
    /// Whether the function side was solved, so that a failure is the argument's.
    pub lhs_was_function: bool,
}

/// A rule waiting for its side conditions.
///
/// `rule` is committed once every check `lhs ≡ rhs` and the equation
/// `pattern_type ≡ replacement_type` are solved below `stack`.
#[derive(Debug, Clone)]
pub struct RuleRequest {
    pub stack: Stack,
    pub rule: Rule,
    pub checks: Vec<(Term, Term)>,
    pub pattern_type: Term,
    pub replacement_type: Term,
}

pub struct RuleFutures {
    pub checks: Vec<Future<EquationResult>>,
    pub replacement_type: Future<EquationResult>,
    /// Settles with whether the rule was installed.
    pub committed: Future<bool>,
}
