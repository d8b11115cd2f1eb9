//! Evaluation of instruction trees into typed terms.
//!
//! Evaluation never stops at an error. Whenever a value has to be used at a type
//! that is not syntactically its own, the evaluator hands out a fresh variable
//! and asks the host to solve the cast; failures are reported through the
//! [EvaluatorInterface] once the equations behind them settle.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use log::{debug, trace};

use kiln_lang_solver::{
    Cast, EquationResult, EquationTrace, FunctionCast, FunctionCastResult, Future, RuleFutures,
    RuleRequest, Stack,
};
use kiln_lang_term::{BasicContext, Rule, Term, TypedValue};

use crate::pattern::{
    ResolvedSubclause, execute_pattern, flatten_pattern, normalize_pattern, resolve_pattern,
};
use crate::result::ElabError;
use crate::{Command, Expr, NodeId, Primitive, Program, RuleCommand};

/// Why the evaluator introduced a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableExplanation {
    ApplyDomain(NodeId),
    ApplyCodomain(NodeId),
    ApplyFunction(NodeId),
    ApplyArgument(NodeId),
    Cast(NodeId),
    Hole(NodeId),
    Declaration(NodeId),
    Axiom(NodeId),
}

impl fmt::Display for VariableExplanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableExplanation::ApplyDomain(node) => write!(f, "?dom{node}"),
            VariableExplanation::ApplyCodomain(node) => write!(f, "?cod{node}"),
            VariableExplanation::ApplyFunction(node) => write!(f, "?fn{node}"),
            VariableExplanation::ApplyArgument(node) => write!(f, "?arg{node}"),
            VariableExplanation::Cast(node) => write!(f, "?cast{node}"),
            VariableExplanation::Hole(node) => write!(f, "?hole{node}"),
            VariableExplanation::Declaration(node) => write!(f, "decl{node}"),
            VariableExplanation::Axiom(node) => write!(f, "ax{node}"),
        }
    }
}

/// What the evaluator needs from its host.
pub trait EvaluatorInterface {
    fn context(&self) -> Rc<BasicContext>;
    fn register_type(&self, symbol: &Term, ty: Term);
    fn register_declaration(&self, declaration: &Term);
    fn register_definable_indeterminate(&self, declaration: &Term);
    fn is_definable(&self, declaration: &Term) -> bool;
    fn add_rule(&self, rule: Rule);
    fn explain_variable(&self, declaration: &Term, explanation: VariableExplanation);
    /// `lhs ≡ rhs` below `stack`, possibly defining indeterminates.
    fn solve(&self, stack: &Stack, lhs: Term, rhs: Term) -> Future<EquationResult>;
    fn solve_no_deduce(&self, stack: &Stack, lhs: Term, rhs: Term) -> Future<EquationResult>;
    fn cast(&self, cast: Cast) -> Future<EquationResult>;
    fn function_cast(&self, cast: FunctionCast) -> Future<FunctionCastResult>;
    fn rule(&self, request: RuleRequest) -> RuleFutures;
    /// The value the host embedded at `index`.
    fn embed(&self, index: usize) -> TypedValue;
    fn report_error(&self, error: ElabError);
    /// Called once every command has been evaluated.
    fn close_interface(&self);
}

/// Evaluates `program` below the empty telescope.
pub fn evaluate<I: EvaluatorInterface + 'static>(
    program: &Program,
    interface: Rc<I>,
) -> TypedValue {
    let ctx = interface.context();
    let stack = Stack::empty(ctx.clone());
    let mut evaluator = Evaluator { interface: interface.clone(), ctx, locals: Vec::new() };
    evaluator.run_commands(&stack, &program.commands);
    let value = evaluator.eval(&stack, &program.value);
    debug!("evaluated program to {:?} : {:?}", value.value, value.ty);
    interface.close_interface();
    value
}

struct Evaluator<I> {
    interface: Rc<I>,
    ctx: Rc<BasicContext>,
    locals: Vec<TypedValue>,
}

impl<I: EvaluatorInterface + 'static> Evaluator<I> {
    fn local(&self, index: usize) -> TypedValue {
        match self.locals.get(index) {
            Some(local) => local.clone(),
            None => panic!("local {index} is not in scope ({} locals)", self.locals.len()),
        }
    }

    /// Reports the error built by `error` if `future` settles as failed.
    fn report_on_failure(
        &self,
        future: Future<EquationResult>,
        error: impl FnOnce(EquationTrace) -> ElabError + 'static,
    ) {
        let interface = Rc::downgrade(&self.interface);
        let ctx = self.ctx.clone();
        future.listen(move |result| {
            if let EquationResult::Failed(report) = result {
                let trace = report.render(&ctx.names.borrow());
                report_through(&interface, error(trace));
            }
        });
    }

    /// A fresh declaration `v` with `v $0 .. $(depth - 1) : ty`, returned bare and applied.
    fn make_variable(
        &self,
        stack: &Stack,
        ty: Term,
        definable: bool,
        explanation: VariableExplanation,
    ) -> (Term, Term) {
        let declaration = self.ctx.arena.declaration();
        self.interface.register_declaration(&declaration);
        if definable {
            self.interface.register_definable_indeterminate(&declaration);
        }
        self.interface.register_type(&declaration, stack.instance_of_type_family(ty));
        self.interface.explain_variable(&declaration, explanation);
        let value = stack.apply_args(declaration.clone());
        (declaration, value)
    }

    /// `source` retyped to `target_type`.
    fn cast(
        &self,
        stack: &Stack,
        id: NodeId,
        source: TypedValue,
        target_type: Term,
        error: impl FnOnce(EquationTrace) -> ElabError + 'static,
    ) -> Term {
        if stack.reduce_clean(source.ty.clone()) == stack.reduce_clean(target_type.clone()) {
            return source.value;
        }
        let (variable, value) =
            self.make_variable(stack, target_type.clone(), false, VariableExplanation::Cast(id));
        let future = self.interface.cast(Cast {
            stack: stack.clone(),
            variable,
            source_type: source.ty,
            source: source.value,
            target_type,
        });
        self.report_on_failure(future, error);
        value
    }

    fn cast_to_type(
        &self,
        stack: &Stack,
        id: NodeId,
        source: TypedValue,
        error: impl FnOnce(EquationTrace) -> ElabError + 'static,
    ) -> Term {
        let typ = self.ctx.primitives.typ.clone();
        self.cast(stack, id, source, typ, error)
    }

    fn eval(&mut self, stack: &Stack, expr: &Expr) -> TypedValue {
        let p = &self.ctx.primitives;
        match expr {
            Expr::Apply { id, lhs, rhs } => {
                let function = self.eval(stack, lhs);
                let argument = self.eval(stack, rhs);
                self.apply(stack, *id, function, argument)
            }
            Expr::Local { index, .. } => self.local(*index),
            Expr::Embed { index, .. } => self.interface.embed(*index),
            Expr::Primitive { primitive: Primitive::Type, .. } => {
                TypedValue::new(p.typ.clone(), p.typ.clone())
            }
            Expr::Primitive { primitive: Primitive::Arrow, .. } => {
                TypedValue::new(p.arrow.clone(), p.arrow_type.clone())
            }
            Expr::TypeFamilyOver { id, ty } => {
                let ty = self.eval(stack, ty);
                let node = *id;
                let ty = self.cast_to_type(stack, node, ty, move |trace| {
                    ElabError::BadTypeFamilyType { node, trace }
                });
                let p = &self.ctx.primitives;
                TypedValue::new(p.type_family_of(&self.ctx.arena, ty), p.typ.clone())
            }
        }
    }

    fn apply(
        &mut self,
        stack: &Stack,
        node: NodeId,
        function: TypedValue,
        argument: TypedValue,
    ) -> TypedValue {
        let arena = self.ctx.arena.clone();
        let function_type = stack.reduce_clean(function.ty.clone());
        if let Some((domain, codomain)) = self.ctx.primitives.as_arrow(&function_type) {
            let argument = self.cast(stack, node, argument, domain, move |trace| {
                ElabError::MismatchedArgType { node, trace }
            });
            let ty = arena.apply(codomain, argument.clone());
            return TypedValue::new(arena.apply(function.value, argument), ty);
        }

        trace!("{node}: applying a term of type {function_type:?}");
        let p = &self.ctx.primitives;
        let (_, domain) =
            self.make_variable(stack, p.typ.clone(), true, VariableExplanation::ApplyDomain(node));
        let (_, codomain) = self.make_variable(
            stack,
            p.type_family_of(&arena, domain.clone()),
            true,
            VariableExplanation::ApplyCodomain(node),
        );
        let expected_function_type = p.arrow_of(&arena, domain.clone(), codomain.clone());
        let (function_variable, function_value) = self.make_variable(
            stack,
            expected_function_type.clone(),
            false,
            VariableExplanation::ApplyFunction(node),
        );
        let (argument_variable, argument_value) = self.make_variable(
            stack,
            domain.clone(),
            false,
            VariableExplanation::ApplyArgument(node),
        );

        let future = self.interface.function_cast(FunctionCast {
            stack: stack.clone(),
            function_variable,
            function_type: function.ty,
            function_value: function.value,
            expected_function_type,
            argument_variable,
            argument_type: argument.ty,
            argument_value: argument.value,
            expected_argument_type: domain,
        });
        let interface = Rc::downgrade(&self.interface);
        let ctx = self.ctx.clone();
        future.listen(move |outcome| {
            let EquationResult::Failed(report) = outcome.result else {
                return;
            };
            let trace = report.render(&ctx.names.borrow());
            let error = if outcome.lhs_was_function {
                ElabError::MismatchedArgType { node, trace }
            } else {
                ElabError::NotAFunction { node, trace }
            };
            report_through(&interface, error);
        });

        let ty = arena.apply(codomain, argument_value.clone());
        TypedValue::new(arena.apply(function_value, argument_value), ty)
    }

    fn run_commands(&mut self, stack: &Stack, commands: &[Command]) {
        for command in commands {
            self.run_command(stack, command);
        }
    }

    fn run_command(&mut self, stack: &Stack, command: &Command) {
        trace!("{}: running command at depth {}", command.id(), stack.depth());
        match command {
            Command::DeclareHole { id, ty } => {
                let node = *id;
                let ty = self.eval(stack, ty);
                let ty = self.cast_to_type(stack, node, ty, move |trace| {
                    ElabError::BadHoleType { node, trace }
                });
                let (_, value) =
                    self.make_variable(stack, ty.clone(), true, VariableExplanation::Hole(node));
                self.locals.push(TypedValue::new(value, ty));
            }
            Command::Declare { id, ty } => {
                let node = *id;
                let ty = self.eval(stack, ty);
                let ty = self.cast_to_type(stack, node, ty, move |trace| {
                    ElabError::BadDeclarationType { node, trace }
                });
                let (_, value) = self.make_variable(
                    stack,
                    ty.clone(),
                    false,
                    VariableExplanation::Declaration(node),
                );
                self.locals.push(TypedValue::new(value, ty));
            }
            Command::Axiom { id, ty } => {
                let node = *id;
                let ty = self.eval(stack, ty);
                let ty = self.cast_to_type(stack, node, ty, move |trace| {
                    ElabError::BadAxiomType { node, trace }
                });
                let axiom = self.ctx.arena.axiom();
                self.interface.register_type(&axiom, stack.instance_of_type_family(ty.clone()));
                self.interface.explain_variable(&axiom, VariableExplanation::Axiom(node));
                self.locals.push(TypedValue::new(stack.apply_args(axiom), ty));
            }
            Command::Let { id, value, ty } => {
                let node = *id;
                let value = self.eval(stack, value);
                let value = match ty {
                    Some(ty) => {
                        let ty = self.eval(stack, ty);
                        let ty = self.cast_to_type(stack, node, ty, move |trace| {
                            ElabError::BadLetType { node, trace }
                        });
                        let cast = self.cast(stack, node, value, ty.clone(), move |trace| {
                            ElabError::MismatchedLetType { node, trace }
                        });
                        TypedValue::new(cast, ty)
                    }
                    None => value,
                };
                self.locals.push(value);
            }
            Command::Rule(rule) => self.run_rule(stack, rule),
            Command::Check { id, value, expected_type, expected_value, deduce } => {
                let node = *id;
                let interface = self.interface.clone();
                let solve = |lhs: Term, rhs: Term| {
                    if *deduce {
                        interface.solve(stack, lhs, rhs)
                    } else {
                        interface.solve_no_deduce(stack, lhs, rhs)
                    }
                };
                let value = self.eval(stack, value);
                let mut required_type = value.ty.clone();
                if let Some(expected_type) = expected_type {
                    let ty = self.eval(stack, expected_type);
                    let ty = self.cast_to_type(stack, node, ty, move |trace| {
                        ElabError::BadRequirementType { node, trace }
                    });
                    let future = solve(value.ty.clone(), ty.clone());
                    self.report_on_failure(future, move |trace| {
                        ElabError::FailedTypeRequirement { node, trace }
                    });
                    required_type = ty;
                }
                if let Some(expected_value) = expected_value {
                    let expected = self.eval(stack, expected_value);
                    let future = solve(expected.ty.clone(), required_type);
                    self.report_on_failure(future, move |trace| {
                        ElabError::MismatchedRequirementRHSType { node, trace }
                    });
                    let future = solve(value.value, expected.value);
                    self.report_on_failure(future, move |trace| {
                        ElabError::FailedRequirement { node, trace }
                    });
                }
            }
            Command::ForAll { id, ty, commands } => {
                let node = *id;
                let ty = self.eval(stack, ty);
                let ty = self.cast_to_type(stack, node, ty, move |trace| {
                    ElabError::BadForAllType { node, trace }
                });
                let argument = self.ctx.arena.argument(stack.depth());
                let inner = stack.extend(ty.clone());
                let base = self.locals.len();
                self.locals.push(TypedValue::new(argument, ty));
                self.run_commands(&inner, commands);
                self.locals.truncate(base);
            }
        }
    }

    fn run_rule(&mut self, stack: &Stack, rule: &RuleCommand) {
        let node = rule.id;
        let local = |index: usize| self.local(index).value;
        let embed = |index: usize| self.interface.embed(index).value;
        let primary = resolve_pattern(&rule.primary, &local, &embed);
        let subclauses = rule
            .subclauses
            .iter()
            .map(|subclause| ResolvedSubclause {
                id: subclause.id,
                used_captures: subclause.used_captures.clone(),
                pattern: resolve_pattern(&subclause.pattern, &local, &embed),
            })
            .collect();

        let folded = match normalize_pattern(node, primary, subclauses, rule.capture_count) {
            Ok(folded) => folded,
            Err(error) => return self.interface.report_error(*error),
        };
        if self.interface.is_definable(&folded.head)
            || folded.head.symbol().is_some_and(|id| self.ctx.has_rule(id))
        {
            return self.interface.report_error(ElabError::InvalidRuleHead { node });
        }
        let flat = match flatten_pattern(&self.ctx.arena, folded) {
            Ok(flat) => flat,
            Err(error) => return self.interface.report_error(*error),
        };

        let mut subexpression = |index: usize, below: &Stack, requested: Vec<Term>| -> Term {
            let base = self.locals.len();
            for capture in requested {
                let ty = type_of_capture(below, &capture);
                self.locals.push(TypedValue::new(capture, ty));
            }
            let value = self.eval(below, &rule.subclauses[index].matched);
            self.locals.truncate(base);
            value.value
        };
        let execution = match execute_pattern(stack, flat, &mut subexpression) {
            Ok(execution) => execution,
            Err(error) => return self.interface.report_error(*error),
        };

        let below = execution.pattern_stack;
        let base = self.locals.len();
        for capture in execution.captures {
            let ty = type_of_capture(&below, &capture);
            self.locals.push(TypedValue::new(capture, ty));
        }
        self.run_commands(&below, &rule.commands);
        let replacement = self.eval(&below, &rule.replacement);
        self.locals.truncate(base);

        let (check_ids, checks): (Vec<NodeId>, Vec<(Term, Term)>) =
            execution.checks.into_iter().map(|(id, lhs, rhs)| (id, (lhs, rhs))).unzip();
        let futures = self.interface.rule(RuleRequest {
            stack: below,
            rule: Rule { pattern: execution.pattern, replacement: replacement.value },
            checks,
            pattern_type: execution.type_of_pattern,
            replacement_type: replacement.ty,
        });

        let failed = Rc::new(Cell::new(false));
        for (check, id) in futures.checks.into_iter().zip(check_ids) {
            let failed = failed.clone();
            self.report_on_failure(
                check.then(move |result| mark_failure(&failed, result)),
                move |trace| ElabError::FailedPatternCheck { node: id, trace },
            );
        }
        let replacement_failed = failed.clone();
        self.report_on_failure(
            futures.replacement_type.then(move |result| mark_failure(&replacement_failed, result)),
            move |trace| ElabError::MismatchedReplacementType { node, trace },
        );
        let interface = Rc::downgrade(&self.interface);
        futures.committed.listen(move |committed| {
            if !committed && !failed.get() {
                report_through(&interface, ElabError::InvalidRuleHead { node });
            }
        });
    }
}

fn report_through<I: EvaluatorInterface>(interface: &Weak<I>, error: ElabError) {
    match interface.upgrade() {
        Some(interface) => interface.report_error(error),
        None => debug!("dropping error reported after the host went away: {error}"),
    }
}

fn mark_failure(failed: &Cell<bool>, result: EquationResult) -> EquationResult {
    if !result.is_solved() {
        failed.set(true);
    }
    result
}

fn type_of_capture(stack: &Stack, capture: &Term) -> Term {
    match capture.as_argument().and_then(|index| stack.type_of_arg(index)) {
        Some(ty) => ty,
        None => panic!("capture {capture:?} is not bound by the pattern"),
    }
}
