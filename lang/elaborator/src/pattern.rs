//! Turning the left-hand side of a rule into a match program.
//!
//! A rule pattern goes through four stages:
//!
//! 1. [resolve_pattern] replaces locals and embeds by the terms they stand for.
//! 2. [normalize_pattern] folds applications into head/argument spines and sorts
//!    every position into destructuring, capturing, checking or ignoring.
//! 3. [flatten_pattern] linearizes the spines into match shards, assigning each
//!    captured argument its position in the capture list and interleaving the
//!    subclauses as soon as the captures they request are bound.
//! 4. [execute_pattern] walks the shards below a [Stack], typing every capture,
//!    recording the assumptions a successful match implies and producing the
//!    [Pattern] that is eventually installed.

use kiln_lang_solver::Stack;
use kiln_lang_term::{Arena, Pattern, PatternBody, PatternStep, Term, TermKind};
use log::trace;

use crate::result::{ElabError, ElabResult};
use crate::{NodeId, Pat};

/// A pattern whose locals and embeds have been replaced by terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternExpr {
    Apply { id: NodeId, lhs: Box<PatternExpr>, rhs: Box<PatternExpr> },
    Embed { id: NodeId, value: Term },
    Capture { id: NodeId, index: usize },
    Hole { id: NodeId },
}

impl PatternExpr {
    pub fn id(&self) -> NodeId {
        match self {
            PatternExpr::Apply { id, .. }
            | PatternExpr::Embed { id, .. }
            | PatternExpr::Capture { id, .. }
            | PatternExpr::Hole { id } => *id,
        }
    }

    /// The term this pattern demands, with captures replaced by their positions.
    pub fn as_expression(&self, arena: &Arena, captures: &[Term]) -> ElabResult<Term> {
        match self {
            PatternExpr::Apply { lhs, rhs, .. } => {
                let lhs = lhs.as_expression(arena, captures)?;
                let rhs = rhs.as_expression(arena, captures)?;
                Ok(arena.apply(lhs, rhs))
            }
            PatternExpr::Embed { value, .. } => Ok(value.clone()),
            PatternExpr::Capture { id, index } => match captures.get(*index) {
                Some(capture) => Ok(capture.clone()),
                None => {
                    Err(Box::new(ElabError::MissingCaptureInRule { node: *id, capture: *index }))
                }
            },
            PatternExpr::Hole { id } => {
                Err(Box::new(ElabError::InvalidNondestructurablePattern { node: *id }))
            }
        }
    }
}

pub fn resolve_pattern(
    pat: &Pat,
    local: &impl Fn(usize) -> Term,
    embed: &impl Fn(usize) -> Term,
) -> PatternExpr {
    match pat {
        Pat::Apply { id, lhs, rhs } => PatternExpr::Apply {
            id: *id,
            lhs: Box::new(resolve_pattern(lhs, local, embed)),
            rhs: Box::new(resolve_pattern(rhs, local, embed)),
        },
        Pat::Local { id, index } => PatternExpr::Embed { id: *id, value: local(*index) },
        Pat::Embed { id, index } => PatternExpr::Embed { id: *id, value: embed(*index) },
        Pat::Capture { id, index } => PatternExpr::Capture { id: *id, index: *index },
        Pat::Hole { id } => PatternExpr::Hole { id: *id },
    }
}

/// What to do with one position of a spine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternNode {
    /// Destructure: the value must reduce to `head` applied to one value per arg.
    Apply { id: NodeId, head: Term, args: Vec<PatternNode> },
    Capture { id: NodeId, index: usize },
    /// The value must be equal to the expression.
    Check { id: NodeId, expected: PatternExpr },
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldedSubclause {
    pub id: NodeId,
    pub used_captures: Vec<usize>,
    pub head: Term,
    pub args: Vec<PatternNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldedPattern {
    pub id: NodeId,
    /// The declaration the rule is for.
    pub head: Term,
    /// Leading arguments of the head that are the arguments in scope.
    pub stack_arg_count: usize,
    pub capture_count: usize,
    /// The remaining arguments of the head.
    pub matches: Vec<PatternNode>,
    pub subclauses: Vec<FoldedSubclause>,
}

/// A pattern whose locals and embeds are resolved, paired with its subclause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSubclause {
    pub id: NodeId,
    pub used_captures: Vec<usize>,
    pub pattern: PatternExpr,
}

struct Spine {
    head: PatternExpr,
    /// Arguments with the id of the application that supplied them.
    args: Vec<(NodeId, PatternExpr)>,
}

impl Spine {
    fn of(expr: PatternExpr) -> Self {
        let mut args = Vec::new();
        let mut head = expr;
        while let PatternExpr::Apply { id, lhs, rhs } = head {
            args.push((id, *rhs));
            head = *lhs;
        }
        args.reverse();
        Spine { head, args }
    }

    fn refold(self) -> PatternExpr {
        self.args.into_iter().fold(self.head, |lhs, (id, rhs)| PatternExpr::Apply {
            id,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }
}

fn convert_to_node(expr: PatternExpr) -> ElabResult<PatternNode> {
    let spine = Spine::of(expr);
    let id = spine.head.id();
    match &spine.head {
        PatternExpr::Embed { value, .. } => {
            let unfolded = value.unfold();
            if matches!(unfolded.head.kind(), TermKind::Axiom(_) | TermKind::Data(_)) {
                let mut args: Vec<PatternNode> = unfolded
                    .args
                    .into_iter()
                    .map(|arg| PatternNode::Check {
                        id,
                        expected: PatternExpr::Embed { id, value: arg },
                    })
                    .collect();
                for (_, arg) in spine.args {
                    args.push(convert_to_node(arg)?);
                }
                Ok(PatternNode::Apply { id, head: unfolded.head, args })
            } else {
                let id = spine.args.last().map_or(id, |(id, _)| *id);
                Ok(PatternNode::Check { id, expected: spine.refold() })
            }
        }
        PatternExpr::Capture { index, .. } if spine.args.is_empty() => {
            Ok(PatternNode::Capture { id, index: *index })
        }
        PatternExpr::Hole { .. } if spine.args.is_empty() => Ok(PatternNode::Ignore),
        PatternExpr::Capture { .. } | PatternExpr::Hole { .. } => {
            Err(Box::new(ElabError::InvalidNondestructurablePattern { node: id }))
        }
        PatternExpr::Apply { .. } => unreachable!("spines never have an application as head"),
    }
}

/// Folds the primary pattern and the subclauses into spines.
///
/// The primary pattern must be a declaration applied to the arguments in scope
/// `$0 .. $(k - 1)` followed by the matched arguments.
pub fn normalize_pattern(
    id: NodeId,
    primary: PatternExpr,
    subclauses: Vec<ResolvedSubclause>,
    capture_count: usize,
) -> ElabResult<FoldedPattern> {
    let spine = Spine::of(primary);
    let PatternExpr::Embed { id: head_id, value } = &spine.head else {
        return Err(Box::new(ElabError::BadApplicationInPattern { node: spine.head.id() }));
    };
    let unfolded = value.unfold();
    let scoped =
        unfolded.args.iter().enumerate().all(|(index, arg)| arg.as_argument() == Some(index));
    if unfolded.head.as_declaration().is_none() || !scoped {
        return Err(Box::new(ElabError::BadApplicationInPattern { node: *head_id }));
    }
    let stack_arg_count = unfolded.args.len();
    let matches = spine
        .args
        .into_iter()
        .map(|(_, arg)| convert_to_node(arg))
        .collect::<ElabResult<Vec<_>>>()?;

    let mut folded_subclauses = Vec::with_capacity(subclauses.len());
    for subclause in subclauses {
        let mut seen = Vec::with_capacity(subclause.used_captures.len());
        for &capture in &subclause.used_captures {
            if seen.contains(&capture) {
                let node = subclause.id;
                return Err(Box::new(ElabError::InvalidDoubleCapture { node, capture }));
            }
            if capture >= capture_count {
                let node = subclause.id;
                return Err(Box::new(ElabError::MissingCaptureInSubclause { node, capture }));
            }
            seen.push(capture);
        }
        match convert_to_node(subclause.pattern)? {
            PatternNode::Apply { head, args, .. } if head.as_axiom().is_some() => {
                folded_subclauses.push(FoldedSubclause {
                    id: subclause.id,
                    used_captures: subclause.used_captures,
                    head,
                    args,
                });
            }
            _ => return Err(Box::new(ElabError::NonmatchableSubclause { node: subclause.id })),
        }
    }

    Ok(FoldedPattern {
        id,
        head: unfolded.head,
        stack_arg_count,
        capture_count,
        matches,
        subclauses: folded_subclauses,
    })
}

/// Where the value a [FlatShard::Match] destructures comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matched {
    /// A previously captured argument.
    Argument(usize),
    /// The value of subclause `subclause`, evaluated with the given captures.
    Subexpression { subclause: usize, requested_captures: Vec<Term> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlatShard {
    /// Capture the next argument of the head.
    Pull,
    Match { id: NodeId, matched: Matched, head: Term, capture_count: usize },
}

/// Captured argument `arg_index` must equal `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatCheck {
    pub id: NodeId,
    pub arg_index: usize,
    pub expected: PatternExpr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatPattern {
    pub id: NodeId,
    pub head: Term,
    pub stack_arg_count: usize,
    /// Arguments of the head consumed by the pattern, the ones in scope included.
    pub args_captured: usize,
    pub shards: Vec<FlatShard>,
    /// For every capture, the argument standing for it.
    pub captures: Vec<Term>,
    pub checks: Vec<FlatCheck>,
}

struct Flattener {
    positions: Vec<Option<usize>>,
    next_arg: usize,
    shards: Vec<FlatShard>,
    checks: Vec<FlatCheck>,
}

impl Flattener {
    fn bind(&mut self, node: PatternNode, position: usize) -> ElabResult {
        match node {
            PatternNode::Apply { id, head, args } => {
                self.destructure(id, Matched::Argument(position), head, args)
            }
            PatternNode::Capture { id, index } => {
                let Some(slot) = self.positions.get_mut(index) else {
                    let error = ElabError::MissingCaptureInRule { node: id, capture: index };
                    return Err(Box::new(error));
                };
                match slot {
                    // A second occurrence requires equality with the first.
                    Some(_) => self.checks.push(FlatCheck {
                        id,
                        arg_index: position,
                        expected: PatternExpr::Capture { id, index },
                    }),
                    None => *slot = Some(position),
                }
                Ok(())
            }
            PatternNode::Check { id, expected } => {
                self.checks.push(FlatCheck { id, arg_index: position, expected });
                Ok(())
            }
            PatternNode::Ignore => Ok(()),
        }
    }

    fn destructure(
        &mut self,
        id: NodeId,
        matched: Matched,
        head: Term,
        args: Vec<PatternNode>,
    ) -> ElabResult {
        self.shards.push(FlatShard::Match { id, matched, head, capture_count: args.len() });
        let first = self.next_arg;
        self.next_arg += args.len();
        for (offset, arg) in args.into_iter().enumerate() {
            self.bind(arg, first + offset)?;
        }
        Ok(())
    }

    fn pull(&mut self, node: PatternNode) -> ElabResult {
        self.shards.push(FlatShard::Pull);
        let position = self.next_arg;
        self.next_arg += 1;
        self.bind(node, position)
    }

    fn missing(&self, captures: &[usize]) -> Option<usize> {
        captures.iter().copied().find(|capture| self.positions[*capture].is_none())
    }
}

/// Linearizes a folded pattern.
///
/// Arguments of the head are pulled lazily: a subclause is matched as soon as
/// every capture it requests is bound, and only the arguments needed for that
/// are pulled before it.
pub fn flatten_pattern(arena: &Arena, folded: FoldedPattern) -> ElabResult<FlatPattern> {
    let args_captured = folded.stack_arg_count + folded.matches.len();
    let mut flattener = Flattener {
        positions: vec![None; folded.capture_count],
        next_arg: folded.stack_arg_count,
        shards: Vec::new(),
        checks: Vec::new(),
    };
    let mut matches = folded.matches.into_iter();

    for (index, subclause) in folded.subclauses.into_iter().enumerate() {
        while let Some(capture) = flattener.missing(&subclause.used_captures) {
            match matches.next() {
                Some(node) => flattener.pull(node)?,
                None => {
                    let node = subclause.id;
                    return Err(Box::new(ElabError::MissingCaptureInSubclause { node, capture }));
                }
            }
        }
        let requested_captures = subclause
            .used_captures
            .iter()
            .filter_map(|capture| flattener.positions[*capture])
            .map(|position| arena.argument(position))
            .collect();
        let matched = Matched::Subexpression { subclause: index, requested_captures };
        flattener.destructure(subclause.id, matched, subclause.head, subclause.args)?;
    }
    for node in matches {
        flattener.pull(node)?;
    }

    let mut captures = Vec::with_capacity(folded.capture_count);
    for (capture, position) in flattener.positions.iter().enumerate() {
        match position {
            Some(position) => captures.push(arena.argument(*position)),
            None => {
                return Err(Box::new(ElabError::MissingCaptureInRule { node: folded.id, capture }));
            }
        }
    }

    Ok(FlatPattern {
        id: folded.id,
        head: folded.head,
        stack_arg_count: folded.stack_arg_count,
        args_captured,
        shards: flattener.shards,
        captures,
        checks: flattener.checks,
    })
}

pub struct PatternExecution {
    pub pattern: Pattern,
    /// The type of the head applied to every argument the pattern consumes.
    pub type_of_pattern: Term,
    /// For every capture, the argument standing for it below `pattern_stack`.
    pub captures: Vec<Term>,
    /// Equations that must hold for the rule to be sound.
    pub checks: Vec<(NodeId, Term, Term)>,
    /// The stack binding every consumed argument and assuming every match.
    pub pattern_stack: Stack,
}

/// Extends `stack` by the domain of `function` and applies it to the new argument.
fn pull_argument(stack: &Stack, function: &Term) -> Option<(Stack, Term)> {
    let (domain, _) = stack.function_parts(function)?;
    let extended = stack.extend(domain);
    let arena = &stack.context().arena;
    let applied = arena.apply(function.clone(), arena.argument(stack.depth()));
    Some((extended, applied))
}

/// Runs the shards below `stack`, whose depth must be the number of arguments in
/// scope of the pattern.
///
/// `subexpression` evaluates the matched expression of a subclause below the stack
/// it is given, with the requested captures in scope.
pub fn execute_pattern(
    stack: &Stack,
    flat: FlatPattern,
    subexpression: &mut dyn FnMut(usize, &Stack, Vec<Term>) -> Term,
) -> ElabResult<PatternExecution> {
    if stack.depth() != flat.stack_arg_count {
        return Err(Box::new(ElabError::BadApplicationInPattern { node: flat.id }));
    }
    let arena = stack.context().arena.clone();
    let mut steps = vec![PatternStep::PullArgument; flat.stack_arg_count];
    let mut outer = arena.apply_arguments(flat.head.clone(), flat.stack_arg_count);
    let mut current = stack.clone();

    for shard in flat.shards {
        match shard {
            FlatShard::Pull => {
                let Some((extended, applied)) = pull_argument(&current, &outer) else {
                    return Err(Box::new(ElabError::BadApplicationInPattern { node: flat.id }));
                };
                steps.push(PatternStep::PullArgument);
                current = extended;
                outer = applied;
            }
            FlatShard::Match { id, matched, head, capture_count } => {
                let subject = match matched {
                    Matched::Argument(index) => arena.argument(index),
                    Matched::Subexpression { subclause, requested_captures } => {
                        subexpression(subclause, &current, requested_captures)
                    }
                };
                let mut destructured = head.clone();
                for _ in 0..capture_count {
                    let Some((extended, applied)) = pull_argument(&current, &destructured) else {
                        return Err(Box::new(ElabError::BadApplicationInSubclause { node: id }));
                    };
                    current = extended;
                    destructured = applied;
                }
                trace!("pattern match {subject:?} ~ {destructured:?}");
                steps.push(PatternStep::Match {
                    substitution: subject.clone(),
                    expected_head: head,
                    args_captured: capture_count,
                });
                current = current.extend_by_assumption(subject, destructured);
            }
        }
    }

    let Some(type_of_pattern) = current.type_of(&outer) else {
        return Err(Box::new(ElabError::BadApplicationInPattern { node: flat.id }));
    };
    let checks = flat
        .checks
        .into_iter()
        .map(|check| {
            let expected = check.expected.as_expression(&arena, &flat.captures)?;
            Ok((check.id, arena.argument(check.arg_index), expected))
        })
        .collect::<ElabResult<Vec<_>>>()?;

    Ok(PatternExecution {
        pattern: Pattern {
            head: flat.head,
            body: PatternBody { args_captured: flat.args_captured, steps },
        },
        type_of_pattern,
        captures: flat.captures,
        checks,
        pattern_stack: current,
    })
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use kiln_lang_term::BasicContext;

    use super::*;

    fn no_subclauses(_: usize, _: &Stack, _: Vec<Term>) -> Term {
        unreachable!("the pattern has no subclauses")
    }

    struct Ids(usize);

    impl Ids {
        fn next(&mut self) -> NodeId {
            self.0 += 1;
            NodeId(self.0)
        }
        fn embed(&mut self, value: &Term) -> PatternExpr {
            PatternExpr::Embed { id: self.next(), value: value.clone() }
        }
        fn capture(&mut self, index: usize) -> PatternExpr {
            PatternExpr::Capture { id: self.next(), index }
        }
        fn apply(&mut self, lhs: PatternExpr, rhs: PatternExpr) -> PatternExpr {
            PatternExpr::Apply { id: self.next(), lhs: Box::new(lhs), rhs: Box::new(rhs) }
        }
    }

    /// `pred : nat -> nat` together with `zero` and `succ`.
    struct Nat {
        ctx: Rc<BasicContext>,
        nat: Term,
        succ: Term,
        pred: Term,
    }

    fn nat() -> Nat {
        let ctx = Rc::new(BasicContext::new(Arena::new()));
        let arena = &ctx.arena;
        let p = &ctx.primitives;
        let nat = arena.axiom();
        let succ = arena.axiom();
        let pred = ctx.declare();
        let endo = p.function_type(arena, nat.clone(), nat.clone());
        ctx.register_type(&nat, p.typ.clone());
        ctx.register_type(&succ, endo.clone());
        ctx.register_type(&pred, endo);
        Nat { ctx, nat, succ, pred }
    }

    #[test]
    fn destructuring_pattern_flattens_to_a_pull_and_a_match() {
        let n = nat();
        let arena = &n.ctx.arena;
        let mut ids = Ids(0);
        // pred (succ #0)
        let succ_x = {
            let succ = ids.embed(&n.succ);
            let x = ids.capture(0);
            ids.apply(succ, x)
        };
        let pred = ids.embed(&n.pred);
        let primary = ids.apply(pred, succ_x);

        let folded = normalize_pattern(NodeId(0), primary, vec![], 1).unwrap();
        assert_eq!(folded.stack_arg_count, 0);
        let flat = flatten_pattern(arena, folded).unwrap();
        assert_eq!(flat.args_captured, 1);
        assert_eq!(flat.captures, vec![arena.argument(1)]);
        assert!(matches!(flat.shards[0], FlatShard::Pull));
        assert!(matches!(
            &flat.shards[1],
            FlatShard::Match { matched: Matched::Argument(0), capture_count: 1, .. }
        ));

        let execution =
            execute_pattern(&Stack::empty(n.ctx.clone()), flat, &mut no_subclauses).unwrap();
        assert_eq!(execution.pattern.capture_count(), 2);
        assert_eq!(execution.pattern_stack.depth(), 2);
        assert_eq!(execution.pattern_stack.type_of_arg(1), Some(n.nat.clone()));
        assert_eq!(execution.pattern_stack.reduce(execution.type_of_pattern), n.nat);
        // The match is assumed below the pattern.
        assert_eq!(
            execution.pattern_stack.reduce(arena.argument(0)),
            arena.apply(n.succ.clone(), arena.argument(1))
        );
    }

    #[test]
    fn repeated_capture_becomes_a_check() {
        let n = nat();
        let arena = &n.ctx.arena;
        let mut ids = Ids(0);
        let eq = n.ctx.declare();
        let head = ids.embed(&eq);
        let x = ids.capture(0);
        let y = ids.capture(0);
        let lhs = ids.apply(head, x);
        let primary = ids.apply(lhs, y);

        let folded = normalize_pattern(NodeId(0), primary, vec![], 1).unwrap();
        let flat = flatten_pattern(arena, folded).unwrap();
        assert_eq!(flat.checks.len(), 1);
        assert_eq!(flat.checks[0].arg_index, 1);
        assert_eq!(flat.captures, vec![arena.argument(0)]);
    }

    #[test]
    fn applied_capture_cannot_be_destructured() {
        let n = nat();
        let mut ids = Ids(0);
        let pred = ids.embed(&n.pred);
        let f = ids.capture(0);
        let zero = ids.embed(&n.nat);
        let applied = ids.apply(f, zero);
        let primary = ids.apply(pred, applied);
        let err = normalize_pattern(NodeId(0), primary, vec![], 1).unwrap_err();
        assert!(matches!(*err, ElabError::InvalidNondestructurablePattern { .. }));
    }

    #[test]
    fn pattern_must_be_headed_by_a_declaration() {
        let n = nat();
        let mut ids = Ids(0);
        let succ = ids.embed(&n.succ);
        let x = ids.capture(0);
        let primary = ids.apply(succ, x);
        let err = normalize_pattern(NodeId(0), primary, vec![], 1).unwrap_err();
        assert!(matches!(*err, ElabError::BadApplicationInPattern { .. }));
    }

    #[test]
    fn unbound_capture_is_reported() {
        let n = nat();
        let arena = &n.ctx.arena;
        let mut ids = Ids(0);
        let pred = ids.embed(&n.pred);
        let x = ids.capture(0);
        let primary = ids.apply(pred, x);
        let folded = normalize_pattern(NodeId(0), primary, vec![], 2).unwrap();
        let err = flatten_pattern(arena, folded).unwrap_err();
        assert_eq!(*err, ElabError::MissingCaptureInRule { node: NodeId(0), capture: 1 });
    }

    #[test]
    fn subclauses_pull_only_what_they_need() {
        let n = nat();
        let arena = &n.ctx.arena;
        let mut ids = Ids(0);
        let two = n.ctx.declare();
        // two #0 #1 where (f #0) = succ #2
        let head = ids.embed(&two);
        let x = ids.capture(0);
        let y = ids.capture(1);
        let partial = ids.apply(head, x);
        let primary = ids.apply(partial, y);
        let succ = ids.embed(&n.succ);
        let z = ids.capture(2);
        let pattern = ids.apply(succ, z);
        let subclause = ResolvedSubclause { id: NodeId(100), used_captures: vec![0], pattern };

        let folded = normalize_pattern(NodeId(0), primary, vec![subclause], 3).unwrap();
        let flat = flatten_pattern(arena, folded).unwrap();
        assert_eq!(flat.args_captured, 2);
        assert!(matches!(flat.shards[0], FlatShard::Pull));
        match &flat.shards[1] {
            FlatShard::Match {
                matched: Matched::Subexpression { subclause, requested_captures }, ..
            } => {
                assert_eq!(*subclause, 0);
                assert_eq!(requested_captures, &vec![arena.argument(0)]);
            }
            shard => panic!("expected a subclause match, got {shard:?}"),
        }
        assert!(matches!(flat.shards[2], FlatShard::Pull));
        assert_eq!(flat.captures, vec![arena.argument(0), arena.argument(2), arena.argument(1)]);
    }

    #[test]
    fn subclause_requesting_a_capture_twice_is_rejected() {
        let n = nat();
        let mut ids = Ids(0);
        let pred = ids.embed(&n.pred);
        let x = ids.capture(0);
        let primary = ids.apply(pred, x);
        let succ = ids.embed(&n.succ);
        let y = ids.capture(1);
        let pattern = ids.apply(succ, y);
        let subclause = ResolvedSubclause { id: NodeId(50), used_captures: vec![0, 0], pattern };
        let err = normalize_pattern(NodeId(0), primary, vec![subclause], 2).unwrap_err();
        assert_eq!(*err, ElabError::InvalidDoubleCapture { node: NodeId(50), capture: 0 });
    }

    #[test]
    fn subclause_must_be_headed_by_an_axiom() {
        let n = nat();
        let mut ids = Ids(0);
        let pred = ids.embed(&n.pred);
        let x = ids.capture(0);
        let primary = ids.apply(pred, x);
        let subclause =
            ResolvedSubclause { id: NodeId(60), used_captures: vec![0], pattern: ids.capture(1) };
        let err = normalize_pattern(NodeId(0), primary, vec![subclause], 2).unwrap_err();
        assert_eq!(*err, ElabError::NonmatchableSubclause { node: NodeId(60) });
    }

    #[test]
    fn over_applied_axiom_is_rejected_during_execution() {
        let n = nat();
        let arena = &n.ctx.arena;
        let mut ids = Ids(0);
        // pred (succ #0 #1): succ only takes one argument.
        let succ = ids.embed(&n.succ);
        let x = ids.capture(0);
        let y = ids.capture(1);
        let partial = ids.apply(succ, x);
        let over = ids.apply(partial, y);
        let pred = ids.embed(&n.pred);
        let primary = ids.apply(pred, over);
        let folded = normalize_pattern(NodeId(0), primary, vec![], 2).unwrap();
        let flat = flatten_pattern(arena, folded).unwrap();
        let result = execute_pattern(&Stack::empty(n.ctx.clone()), flat, &mut no_subclauses);
        let err = result.map(|_| ()).unwrap_err();
        assert!(matches!(err.as_ref(), ElabError::BadApplicationInSubclause { .. }));
    }
}
