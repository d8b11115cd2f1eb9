use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, trace};

use kiln_lang_term::{
    BasicContext, HashMap, HashSet, Pattern, PatternBody, PatternStep, Rule, SymbolId, Term,
};

use crate::{
    Cast, Equation, EquationReport, EquationResult, FunctionCast, FunctionCastResult, Future,
    Promise, ReportStatus, RuleFutures, RuleRequest, Solver, Stack, Step, channel,
};

type NodeId = usize;
type ObligationId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Open,
    Stalled,
    Decomposed { remaining: usize },
    Solved,
    Failed,
}

/// Which part of an obligation a root equation decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Main,
    Argument,
    Check(usize),
    ReplacementType,
}

#[derive(Debug, Clone, Copy)]
struct Owner {
    obligation: ObligationId,
    slot: Slot,
}

#[derive(Debug, Clone, Copy)]
enum Parent {
    Root(Owner),
    Child(NodeId),
}

struct Node {
    equation: Equation,
    status: Status,
    parent: Parent,
    children: Vec<NodeId>,
}

struct FunctionCastState {
    cast: FunctionCast,
    promise: Promise<FunctionCastResult>,
}

struct RuleState {
    /// Dropped as soon as the rule is refused.
    request: Option<RuleRequest>,
    checks: Vec<Option<Promise<EquationResult>>>,
    replacement_type: Option<Promise<EquationResult>>,
    committed: Option<Promise<bool>>,
    outstanding: usize,
}

enum Obligation {
    Equation(Promise<EquationResult>),
    Cast { cast: Cast, promise: Promise<EquationResult> },
    FunctionCast(FunctionCastState),
    Rule(RuleState),
}

/// Owns every live equation and drives them to a fixpoint.
///
/// Work is registered as an obligation: a plain equation, a cast, a function cast
/// or a rule derivation. Each obligation poses one or more root equations; the
/// solver decomposes roots into trees of derived equations. When a root settles,
/// the obligation's effect (installing a cast or a rule) is carried out and its
/// promise is settled, running any listener synchronously.
///
/// Stalled equations are retried whenever the rule table grew since they were
/// last looked at. Equations and obligations are forgotten once they settle.
pub struct Manager {
    ctx: Rc<BasicContext>,
    nodes: HashMap<NodeId, Node>,
    ready: VecDeque<NodeId>,
    stalled: Vec<NodeId>,
    obligations: HashMap<ObligationId, Obligation>,
    next_id: usize,
    definable: HashSet<SymbolId>,
    failed: usize,
    generation: u64,
}

impl Manager {
    pub fn new(ctx: Rc<BasicContext>) -> Self {
        let generation = ctx.rule_generation();
        Manager {
            ctx,
            nodes: HashMap::default(),
            ready: VecDeque::new(),
            stalled: Vec::new(),
            obligations: HashMap::default(),
            next_id: 0,
            definable: HashSet::default(),
            failed: 0,
            generation,
        }
    }

    pub fn context(&self) -> &Rc<BasicContext> {
        &self.ctx
    }

    /// Marks `declaration` as an indeterminate the solver may define once.
    pub fn register_definable_indeterminate(&mut self, declaration: &Term) {
        match declaration.as_declaration() {
            Some(id) => {
                self.definable.insert(id);
            }
            None => panic!("only declarations can be indeterminates, got {declaration:?}"),
        }
    }

    pub fn is_definable(&self, id: SymbolId) -> bool {
        self.definable.contains(&id)
    }

    pub fn reduce(&self, stack: &Stack, term: Term) -> Term {
        stack.reduce_clean(term)
    }

    pub fn register_equation(&mut self, equation: Equation) -> Future<EquationResult> {
        let (promise, future) = channel();
        let obligation = self.add_obligation(Obligation::Equation(promise));
        self.add_root(equation, Owner { obligation, slot: Slot::Main });
        future
    }

    /// Registers `cast.source_type ≡ cast.target_type`; once solved the cast
    /// variable is defined as the source.
    pub fn register_cast(&mut self, cast: Cast) -> Future<EquationResult> {
        let (promise, future) = channel();
        let equation =
            Equation::new(cast.stack.clone(), cast.source_type.clone(), cast.target_type.clone());
        let obligation = self.add_obligation(Obligation::Cast { cast, promise });
        self.add_root(equation, Owner { obligation, slot: Slot::Main });
        future
    }

    pub fn register_function_cast(&mut self, cast: FunctionCast) -> Future<FunctionCastResult> {
        let (promise, future) = channel();
        let equation = Equation::new(
            cast.stack.clone(),
            cast.function_type.clone(),
            cast.expected_function_type.clone(),
        );
        let obligation =
            self.add_obligation(Obligation::FunctionCast(FunctionCastState { cast, promise }));
        self.add_root(equation, Owner { obligation, slot: Slot::Main });
        future
    }

    /// Registers the side conditions of a rule; the rule is installed once all of
    /// them are solved.
    pub fn register_rule(&mut self, request: RuleRequest) -> RuleFutures {
        let stack = request.stack.clone();
        let mut check_futures = Vec::with_capacity(request.checks.len());
        let mut check_promises = Vec::with_capacity(request.checks.len());
        for _ in &request.checks {
            let (promise, future) = channel();
            check_promises.push(Some(promise));
            check_futures.push(future);
        }
        let (replacement_promise, replacement_future) = channel();
        let (committed_promise, committed_future) = channel();
        let equations: Vec<(Equation, Slot)> = request
            .checks
            .iter()
            .enumerate()
            .map(|(index, (lhs, rhs))| {
                (Equation::new(stack.clone(), lhs.clone(), rhs.clone()), Slot::Check(index))
            })
            .chain(std::iter::once((
                Equation::new(
                    stack.clone(),
                    request.pattern_type.clone(),
                    request.replacement_type.clone(),
                ),
                Slot::ReplacementType,
            )))
            .collect();
        let obligation = self.add_obligation(Obligation::Rule(RuleState {
            request: Some(request),
            checks: check_promises,
            replacement_type: Some(replacement_promise),
            committed: Some(committed_promise),
            outstanding: equations.len(),
        }));
        for (equation, slot) in equations {
            self.add_root(equation, Owner { obligation, slot });
        }
        RuleFutures {
            checks: check_futures,
            replacement_type: replacement_future,
            committed: committed_future,
        }
    }

    /// Steps equations until nothing is ready and no stalled equation can have
    /// become unstuck.
    pub fn run(&mut self) {
        loop {
            while let Some(index) = self.ready.pop_front() {
                self.process(index);
                self.wake_if_rules_changed();
            }
            self.wake_if_rules_changed();
            if self.ready.is_empty() {
                return;
            }
        }
    }

    /// Whether every obligation settled successfully.
    pub fn solved(&self) -> bool {
        self.failed == 0 && self.obligations.is_empty()
    }

    pub fn pending_equations(&self) -> usize {
        self.nodes.len()
    }

    /// Settles every unresolved obligation as failed and releases all state.
    ///
    /// Equations that are still open are reported as stalled.
    pub fn close(&mut self) {
        let mut roots: Vec<(NodeId, Owner)> = self
            .nodes
            .iter()
            .filter_map(|(index, node)| match node.parent {
                Parent::Root(owner) => Some((*index, owner)),
                Parent::Child(_) => None,
            })
            .collect();
        // Roots settle in registration order.
        roots.sort_by_key(|(index, _)| *index);
        for (index, owner) in roots {
            if !self.nodes.contains_key(&index) {
                continue;
            }
            let report = self.report(index, ReportStatus::Stalled);
            self.remove_subtree(index);
            self.resolve(owner, EquationResult::Failed(report));
        }
        self.failed += self.obligations.len();
        self.nodes.clear();
        self.ready.clear();
        self.stalled.clear();
        self.obligations.clear();
        self.definable.clear();
        debug!("manager closed with {} failed obligations", self.failed);
    }

    fn fresh_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn add_obligation(&mut self, obligation: Obligation) -> ObligationId {
        let id = self.fresh_id();
        self.obligations.insert(id, obligation);
        id
    }

    fn add_node(&mut self, equation: Equation, parent: Parent) -> NodeId {
        let index = self.fresh_id();
        let node = Node { equation, status: Status::Open, parent, children: Vec::new() };
        self.nodes.insert(index, node);
        self.ready.push_back(index);
        index
    }

    fn add_root(&mut self, equation: Equation, owner: Owner) -> NodeId {
        self.add_node(equation, Parent::Root(owner))
    }

    fn node_mut(&mut self, index: NodeId) -> &mut Node {
        match self.nodes.get_mut(&index) {
            Some(node) => node,
            None => panic!("equation {index} was already released"),
        }
    }

    fn wake_if_rules_changed(&mut self) {
        let generation = self.ctx.rule_generation();
        if generation == self.generation {
            return;
        }
        self.generation = generation;
        if !self.stalled.is_empty() {
            trace!("waking {} stalled equations", self.stalled.len());
        }
        for index in std::mem::take(&mut self.stalled) {
            if let Some(node) = self.nodes.get_mut(&index) {
                if node.status == Status::Stalled {
                    node.status = Status::Open;
                    self.ready.push_back(index);
                }
            }
        }
    }

    fn process(&mut self, index: NodeId) {
        let equation = match self.nodes.get(&index) {
            Some(node) if node.status == Status::Open => node.equation.clone(),
            _ => return,
        };
        let step = Solver::new(&mut self.definable).step(&equation);
        trace!("equation {index}: {step:?}");
        match step {
            Step::Solved => self.mark_solved(index),
            Step::Failed => self.mark_failed(index),
            Step::Stalled => {
                self.node_mut(index).status = Status::Stalled;
                self.stalled.push(index);
            }
            Step::Derived(children) if children.is_empty() => self.mark_solved(index),
            Step::Derived(children) => {
                self.node_mut(index).status = Status::Decomposed { remaining: children.len() };
                let children: Vec<NodeId> = children
                    .into_iter()
                    .map(|child| self.add_node(child, Parent::Child(index)))
                    .collect();
                self.node_mut(index).children = children;
            }
        }
    }

    fn mark_solved(&mut self, index: NodeId) {
        let node = self.node_mut(index);
        node.status = Status::Solved;
        let parent = node.parent;
        match parent {
            Parent::Root(owner) => {
                self.remove_subtree(index);
                self.resolve(owner, EquationResult::Solved);
            }
            Parent::Child(parent) => {
                let finished = match &mut self.node_mut(parent).status {
                    Status::Decomposed { remaining } => {
                        *remaining -= 1;
                        *remaining == 0
                    }
                    _ => false,
                };
                if finished {
                    self.mark_solved(parent);
                }
            }
        }
    }

    fn mark_failed(&mut self, index: NodeId) {
        let node = self.node_mut(index);
        node.status = Status::Failed;
        let parent = node.parent;
        match parent {
            Parent::Root(owner) => {
                let report = self.report(index, ReportStatus::Failed);
                self.remove_subtree(index);
                self.resolve(owner, EquationResult::Failed(report));
            }
            Parent::Child(parent) => self.mark_failed(parent),
        }
    }

    /// The unsolved part of the tree below `index`.
    fn report(&self, index: NodeId, default: ReportStatus) -> EquationReport {
        let Some(node) = self.nodes.get(&index) else {
            panic!("equation {index} was already released");
        };
        let status = match node.status {
            Status::Failed => ReportStatus::Failed,
            _ => default,
        };
        let causes = node
            .children
            .iter()
            .filter_map(|child| {
                let child_node = self.nodes.get(child)?;
                match child_node.status {
                    Status::Solved => None,
                    Status::Failed => Some(self.report(*child, ReportStatus::Failed)),
                    _ if status == ReportStatus::Failed => None,
                    _ => Some(self.report(*child, ReportStatus::Stalled)),
                }
            })
            .collect();
        EquationReport { equation: node.equation.clone(), status, causes }
    }

    fn remove_subtree(&mut self, index: NodeId) {
        if let Some(node) = self.nodes.remove(&index) {
            for child in node.children {
                self.remove_subtree(child);
            }
        }
    }

    fn resolve(&mut self, owner: Owner, result: EquationResult) {
        let Some(obligation) = self.obligations.remove(&owner.obligation) else {
            panic!("obligation {} settled twice", owner.obligation);
        };
        trace!(
            "settling obligation {} ({:?}): solved = {}",
            owner.obligation,
            owner.slot,
            result.is_solved()
        );
        match obligation {
            Obligation::Equation(promise) => {
                self.count(&result);
                promise.set_value(result);
            }
            Obligation::Cast { cast, promise } => {
                if result.is_solved() {
                    self.install_definition(&cast.stack, &cast.variable, cast.source.clone());
                }
                self.count(&result);
                promise.set_value(result);
            }
            Obligation::FunctionCast(state) => self.resolve_function_cast(owner, state, result),
            Obligation::Rule(state) => self.resolve_rule(owner, state, result),
        }
    }

    fn count(&mut self, result: &EquationResult) {
        if !result.is_solved() {
            self.failed += 1;
        }
    }

    fn resolve_function_cast(
        &mut self,
        owner: Owner,
        state: FunctionCastState,
        result: EquationResult,
    ) {
        let cast = &state.cast;
        match (owner.slot, result.is_solved()) {
            (Slot::Main, true) => {
                let value = cast.function_value.clone();
                self.install_definition(&cast.stack, &cast.function_variable, value);
                let equation = Equation::new(
                    cast.stack.clone(),
                    cast.argument_type.clone(),
                    cast.expected_argument_type.clone(),
                );
                self.obligations.insert(owner.obligation, Obligation::FunctionCast(state));
                let owner = Owner { obligation: owner.obligation, slot: Slot::Argument };
                self.add_root(equation, owner);
            }
            (Slot::Main, false) => {
                self.failed += 1;
                state.promise.set_value(FunctionCastResult { result, lhs_was_function: false });
            }
            (_, solved) => {
                if solved {
                    let value = cast.argument_value.clone();
                    self.install_definition(&cast.stack, &cast.argument_variable, value);
                } else {
                    self.failed += 1;
                }
                state.promise.set_value(FunctionCastResult { result, lhs_was_function: true });
            }
        }
    }

    fn resolve_rule(&mut self, owner: Owner, mut state: RuleState, result: EquationResult) {
        let solved = result.is_solved();
        let promise = match owner.slot {
            Slot::Check(index) => state.checks.get_mut(index).and_then(Option::take),
            _ => state.replacement_type.take(),
        };
        state.outstanding -= 1;
        let refused = if solved { None } else { state.committed.take() };
        if refused.is_some() {
            if let Some(request) = state.request.take() {
                debug!("dropping rule for d{}", request.rule.head());
            }
            self.stop_deducing(owner.obligation);
        }
        let commit = if state.outstanding == 0 {
            state.committed.take().zip(state.request.take())
        } else {
            self.obligations.insert(owner.obligation, Obligation::Rule(state));
            None
        };
        // The failing side condition settles before the rule is dropped.
        if let Some(promise) = promise {
            promise.set_value(result);
        }
        if let Some(refused) = refused {
            self.failed += 1;
            refused.set_value(false);
        }
        if let Some((committed, request)) = commit {
            committed.set_value(self.commit_rule(&request));
        }
    }

    /// Keeps the remaining side conditions of a refused rule from defining
    /// indeterminates on its behalf.
    fn stop_deducing(&mut self, obligation: ObligationId) {
        let mut pending: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, node)| {
                matches!(node.parent, Parent::Root(owner) if owner.obligation == obligation)
            })
            .map(|(index, _)| *index)
            .collect();
        while let Some(index) = pending.pop() {
            let node = self.node_mut(index);
            node.equation.deduce = false;
            pending.extend(node.children.iter().copied());
        }
    }

    fn commit_rule(&self, request: &RuleRequest) -> bool {
        let head = request.rule.head();
        if self.ctx.has_rule(head) {
            debug!("d{head} gained a rule before its derivation finished");
            return false;
        }
        let stack = &request.stack;
        let pattern = &request.rule.pattern;
        let steps = pattern
            .body
            .steps
            .iter()
            .map(|step| match step {
                PatternStep::PullArgument => PatternStep::PullArgument,
                PatternStep::Match { substitution, expected_head, args_captured } => {
                    PatternStep::Match {
                        substitution: stack.eliminate_conglomerates(substitution.clone()),
                        expected_head: expected_head.clone(),
                        args_captured: *args_captured,
                    }
                }
            })
            .collect();
        let rule = Rule {
            pattern: Pattern {
                head: pattern.head.clone(),
                body: PatternBody { args_captured: pattern.body.args_captured, steps },
            },
            replacement: stack.eliminate_conglomerates(request.rule.replacement.clone()),
        };
        debug!("committing rule for d{head}");
        self.ctx.add_rule(rule);
        true
    }

    /// `variable $0 .. $(depth - 1) := value`
    fn install_definition(&self, stack: &Stack, variable: &Term, value: Term) {
        let value = stack.eliminate_conglomerates(value);
        debug!("installing cast {variable:?} := {value:?}");
        let pattern = Pattern::lambda(variable.clone(), stack.depth());
        self.ctx.add_rule(Rule { pattern, replacement: value });
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if !self.obligations.is_empty() {
            self.close();
        }
    }
}
