//! The name-resolved instruction tree the evaluator consumes.
//!
//! Locals are referenced by their position in the evaluator's local stack,
//! embedded values by their index in the host's embed table. Every node carries a
//! [NodeId] so that diagnostics can name it.

use std::cell::Cell;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Type,
    Arrow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Apply { id: NodeId, lhs: Box<Expr>, rhs: Box<Expr> },
    Local { id: NodeId, index: usize },
    Embed { id: NodeId, index: usize },
    Primitive { id: NodeId, primitive: Primitive },
    /// The type of families over the given type.
    TypeFamilyOver { id: NodeId, ty: Box<Expr> },
}

impl Expr {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Apply { id, .. }
            | Expr::Local { id, .. }
            | Expr::Embed { id, .. }
            | Expr::Primitive { id, .. }
            | Expr::TypeFamilyOver { id, .. } => *id,
        }
    }
}

/// A surface pattern, as written on the left of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pat {
    Apply { id: NodeId, lhs: Box<Pat>, rhs: Box<Pat> },
    Local { id: NodeId, index: usize },
    Embed { id: NodeId, index: usize },
    Capture { id: NodeId, index: usize },
    Hole { id: NodeId },
}

impl Pat {
    pub fn id(&self) -> NodeId {
        match self {
            Pat::Apply { id, .. }
            | Pat::Local { id, .. }
            | Pat::Embed { id, .. }
            | Pat::Capture { id, .. }
            | Pat::Hole { id } => *id,
        }
    }
}

/// `where matched = pattern`: `matched` is evaluated with the requested captures
/// pushed onto the locals, in order, and must be destructured by `pattern`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subclause {
    pub id: NodeId,
    pub used_captures: Vec<usize>,
    pub matched: Expr,
    pub pattern: Pat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleCommand {
    pub id: NodeId,
    pub primary: Pat,
    pub subclauses: Vec<Subclause>,
    pub capture_count: usize,
    /// Evaluated below the pattern, with the captures pushed onto the locals.
    pub commands: Vec<Command>,
    pub replacement: Expr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DeclareHole { id: NodeId, ty: Expr },
    Declare { id: NodeId, ty: Expr },
    Axiom { id: NodeId, ty: Expr },
    Let { id: NodeId, value: Expr, ty: Option<Expr> },
    Rule(RuleCommand),
    /// Requires `value : expected_type` and `value ≡ expected_value`.
    Check {
        id: NodeId,
        value: Expr,
        expected_type: Option<Expr>,
        expected_value: Option<Expr>,
        deduce: bool,
    },
    ForAll { id: NodeId, ty: Expr, commands: Vec<Command> },
}

impl Command {
    pub fn id(&self) -> NodeId {
        match self {
            Command::DeclareHole { id, .. }
            | Command::Declare { id, .. }
            | Command::Axiom { id, .. }
            | Command::Let { id, .. }
            | Command::Check { id, .. }
            | Command::ForAll { id, .. } => *id,
            Command::Rule(rule) => rule.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub commands: Vec<Command>,
    pub value: Expr,
}

/// Allocates node ids while building instruction trees.
#[derive(Debug, Default)]
pub struct Builder {
    next: Cell<usize>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh(&self) -> NodeId {
        let id = self.next.get();
        self.next.set(id + 1);
        NodeId(id)
    }

    pub fn apply(&self, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Apply { id: self.fresh(), lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn apply_all(&self, head: Expr, args: impl IntoIterator<Item = Expr>) -> Expr {
        args.into_iter().fold(head, |acc, arg| self.apply(acc, arg))
    }

    pub fn local(&self, index: usize) -> Expr {
        Expr::Local { id: self.fresh(), index }
    }

    pub fn embed(&self, index: usize) -> Expr {
        Expr::Embed { id: self.fresh(), index }
    }

    pub fn typ(&self) -> Expr {
        Expr::Primitive { id: self.fresh(), primitive: Primitive::Type }
    }

    pub fn arrow(&self) -> Expr {
        Expr::Primitive { id: self.fresh(), primitive: Primitive::Arrow }
    }

    pub fn type_family_over(&self, ty: Expr) -> Expr {
        Expr::TypeFamilyOver { id: self.fresh(), ty: Box::new(ty) }
    }

    pub fn pat_apply(&self, lhs: Pat, rhs: Pat) -> Pat {
        Pat::Apply { id: self.fresh(), lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn pat_local(&self, index: usize) -> Pat {
        Pat::Local { id: self.fresh(), index }
    }

    pub fn pat_embed(&self, index: usize) -> Pat {
        Pat::Embed { id: self.fresh(), index }
    }

    pub fn capture(&self, index: usize) -> Pat {
        Pat::Capture { id: self.fresh(), index }
    }

    pub fn hole(&self) -> Pat {
        Pat::Hole { id: self.fresh() }
    }

    pub fn subclause(&self, used_captures: Vec<usize>, matched: Expr, pattern: Pat) -> Subclause {
        Subclause { id: self.fresh(), used_captures, matched, pattern }
    }

    pub fn declare_hole(&self, ty: Expr) -> Command {
        Command::DeclareHole { id: self.fresh(), ty }
    }

    pub fn declare(&self, ty: Expr) -> Command {
        Command::Declare { id: self.fresh(), ty }
    }

    pub fn axiom(&self, ty: Expr) -> Command {
        Command::Axiom { id: self.fresh(), ty }
    }

    pub fn let_(&self, value: Expr, ty: Option<Expr>) -> Command {
        Command::Let { id: self.fresh(), value, ty }
    }

    pub fn rule(
        &self,
        primary: Pat,
        subclauses: Vec<Subclause>,
        capture_count: usize,
        commands: Vec<Command>,
        replacement: Expr,
    ) -> Command {
        Command::Rule(RuleCommand {
            id: self.fresh(),
            primary,
            subclauses,
            capture_count,
            commands,
            replacement,
        })
    }

    pub fn check(
        &self,
        value: Expr,
        expected_type: Option<Expr>,
        expected_value: Option<Expr>,
        deduce: bool,
    ) -> Command {
        Command::Check { id: self.fresh(), value, expected_type, expected_value, deduce }
    }

    pub fn for_all(&self, ty: Expr, commands: Vec<Command>) -> Command {
        Command::ForAll { id: self.fresh(), ty, commands }
    }
}
