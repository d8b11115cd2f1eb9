use miette::Diagnostic;
use thiserror::Error;

use kiln_lang_solver::EquationTrace;

use crate::NodeId;

pub type ElabResult<T = ()> = Result<T, Box<ElabError>>;

/// All user-facing errors of an elaboration.
///
/// Errors arising from an equation carry the rendered equation tree that failed
/// or stalled; pattern-shape errors are found before any equation is posed.
/// Errors accumulate: reporting one never stops the rest of the program from
/// being elaborated.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum ElabError {
    #[error("{node}: the applied term is not a function")]
    #[diagnostic(code("E-001"), help("{trace}"))]
    NotAFunction { node: NodeId, trace: EquationTrace },
    #[error("{node}: the argument does not have the domain type of the function")]
    #[diagnostic(code("E-002"), help("{trace}"))]
    MismatchedArgType { node: NodeId, trace: EquationTrace },
    #[error("{node}: type families can only be formed over types")]
    #[diagnostic(code("E-003"), help("{trace}"))]
    BadTypeFamilyType { node: NodeId, trace: EquationTrace },
    #[error("{node}: the type of a hole must be a type")]
    #[diagnostic(code("E-004"), help("{trace}"))]
    BadHoleType { node: NodeId, trace: EquationTrace },
    #[error("{node}: the type of a declaration must be a type")]
    #[diagnostic(code("E-005"), help("{trace}"))]
    BadDeclarationType { node: NodeId, trace: EquationTrace },
    #[error("{node}: the type of an axiom must be a type")]
    #[diagnostic(code("E-006"), help("{trace}"))]
    BadAxiomType { node: NodeId, trace: EquationTrace },
    #[error("{node}: the annotation of a let must be a type")]
    #[diagnostic(code("E-007"), help("{trace}"))]
    BadLetType { node: NodeId, trace: EquationTrace },
    #[error("{node}: the value of a let does not have the annotated type")]
    #[diagnostic(code("E-008"), help("{trace}"))]
    MismatchedLetType { node: NodeId, trace: EquationTrace },
    #[error("{node}: the bound of a for-all must be a type")]
    #[diagnostic(code("E-009"), help("{trace}"))]
    BadForAllType { node: NodeId, trace: EquationTrace },
    #[error("{node}: the required type is not a type")]
    #[diagnostic(code("E-010"), help("{trace}"))]
    BadRequirementType { node: NodeId, trace: EquationTrace },
    #[error("{node}: the expected value does not have the required type")]
    #[diagnostic(code("E-011"), help("{trace}"))]
    MismatchedRequirementRHSType { node: NodeId, trace: EquationTrace },
    #[error("{node}: the value does not have the required type")]
    #[diagnostic(code("E-012"), help("{trace}"))]
    FailedTypeRequirement { node: NodeId, trace: EquationTrace },
    #[error("{node}: the value is not equal to the expected value")]
    #[diagnostic(code("E-013"), help("{trace}"))]
    FailedRequirement { node: NodeId, trace: EquationTrace },
    #[error("{node}: subclause patterns must be headed by an axiom")]
    #[diagnostic(code("E-014"))]
    NonmatchableSubclause { node: NodeId },
    #[error("{node}: the subclause uses capture {capture}, which is not bound before it")]
    #[diagnostic(code("E-015"))]
    MissingCaptureInSubclause { node: NodeId, capture: usize },
    #[error("{node}: capture {capture} is never bound by the pattern")]
    #[diagnostic(code("E-016"))]
    MissingCaptureInRule { node: NodeId, capture: usize },
    #[error("{node}: a pattern must apply a declaration to the arguments in scope, then to others")]
    #[diagnostic(code("E-017"))]
    BadApplicationInPattern { node: NodeId },
    #[error("{node}: the matched axiom is applied to more arguments than its type allows")]
    #[diagnostic(code("E-018"))]
    BadApplicationInSubclause { node: NodeId },
    #[error("{node}: capture {capture} is requested twice by the subclause")]
    #[diagnostic(code("E-019"))]
    InvalidDoubleCapture { node: NodeId, capture: usize },
    #[error("{node}: this part of the pattern can neither be destructured nor checked")]
    #[diagnostic(code("E-020"), help("Holes and captures cannot be applied to arguments"))]
    InvalidNondestructurablePattern { node: NodeId },
    #[error("{node}: the replacement does not have the type of the pattern")]
    #[diagnostic(code("E-021"), help("{trace}"))]
    MismatchedReplacementType { node: NodeId, trace: EquationTrace },
    #[error("{node}: a value matched by the pattern is not equal to what the pattern demands")]
    #[diagnostic(code("E-022"), help("{trace}"))]
    FailedPatternCheck { node: NodeId, trace: EquationTrace },
    #[error("{node}: rules can only be given for declarations that are neither holes nor defined")]
    #[diagnostic(code("E-023"))]
    InvalidRuleHead { node: NodeId },
}

impl ElabError {
    /// The instruction node the error is about.
    pub fn node(&self) -> NodeId {
        match self {
            ElabError::NotAFunction { node, .. }
            | ElabError::MismatchedArgType { node, .. }
            | ElabError::BadTypeFamilyType { node, .. }
            | ElabError::BadHoleType { node, .. }
            | ElabError::BadDeclarationType { node, .. }
            | ElabError::BadAxiomType { node, .. }
            | ElabError::BadLetType { node, .. }
            | ElabError::MismatchedLetType { node, .. }
            | ElabError::BadForAllType { node, .. }
            | ElabError::BadRequirementType { node, .. }
            | ElabError::MismatchedRequirementRHSType { node, .. }
            | ElabError::FailedTypeRequirement { node, .. }
            | ElabError::FailedRequirement { node, .. }
            | ElabError::NonmatchableSubclause { node }
            | ElabError::MissingCaptureInSubclause { node, .. }
            | ElabError::MissingCaptureInRule { node, .. }
            | ElabError::BadApplicationInPattern { node }
            | ElabError::BadApplicationInSubclause { node }
            | ElabError::InvalidDoubleCapture { node, .. }
            | ElabError::InvalidNondestructurablePattern { node }
            | ElabError::MismatchedReplacementType { node, .. }
            | ElabError::FailedPatternCheck { node, .. }
            | ElabError::InvalidRuleHead { node } => *node,
        }
    }

    /// The equation behind the error, if it came from one.
    pub fn trace(&self) -> Option<&EquationTrace> {
        match self {
            ElabError::NotAFunction { trace, .. }
            | ElabError::MismatchedArgType { trace, .. }
            | ElabError::BadTypeFamilyType { trace, .. }
            | ElabError::BadHoleType { trace, .. }
            | ElabError::BadDeclarationType { trace, .. }
            | ElabError::BadAxiomType { trace, .. }
            | ElabError::BadLetType { trace, .. }
            | ElabError::MismatchedLetType { trace, .. }
            | ElabError::BadForAllType { trace, .. }
            | ElabError::BadRequirementType { trace, .. }
            | ElabError::MismatchedRequirementRHSType { trace, .. }
            | ElabError::FailedTypeRequirement { trace, .. }
            | ElabError::FailedRequirement { trace, .. }
            | ElabError::MismatchedReplacementType { trace, .. }
            | ElabError::FailedPatternCheck { trace, .. } => Some(trace),
            _ => None,
        }
    }

    /// Whether the error only stems from equations left undecided.
    pub fn is_soft(&self) -> bool {
        self.trace().is_some_and(|trace| trace.stalled)
    }
}
