use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use kiln_lang_solver::{
    Cast, Equation, EquationResult, FunctionCast, FunctionCastResult, Future, Manager, RuleFutures,
    RuleRequest, Stack,
};
use kiln_lang_term::{BasicContext, Rule, Term, TypedValue};

use crate::evaluator::{EvaluatorInterface, VariableExplanation, evaluate};
use crate::result::ElabError;
use crate::Program;

/// The host side of an elaboration.
///
/// A session owns the equation manager, the values made available to programs
/// through `Embed` and the errors reported so far. Programs are elaborated one
/// after another against the same context, so later programs see the rules and
/// declarations of earlier ones.
pub struct Session {
    ctx: Rc<BasicContext>,
    manager: RefCell<Manager>,
    embeds: RefCell<Vec<TypedValue>>,
    errors: RefCell<Vec<ElabError>>,
}

impl Session {
    pub fn new(ctx: Rc<BasicContext>) -> Rc<Self> {
        Rc::new(Session {
            manager: RefCell::new(Manager::new(ctx.clone())),
            ctx,
            embeds: RefCell::new(Vec::new()),
            errors: RefCell::new(Vec::new()),
        })
    }

    pub fn context(&self) -> &Rc<BasicContext> {
        &self.ctx
    }

    /// Makes `value` available as `Embed(index)`.
    pub fn embed_value(&self, value: TypedValue) -> usize {
        let mut embeds = self.embeds.borrow_mut();
        embeds.push(value);
        embeds.len() - 1
    }

    /// Creates a named axiom of type `ty` and embeds it.
    pub fn declare_axiom(&self, name: &str, ty: Term) -> (Term, usize) {
        let axiom = self.ctx.arena.axiom();
        self.ctx.register_type(&axiom, ty.clone());
        self.ctx.name(&axiom, name);
        let index = self.embed_value(TypedValue::new(axiom.clone(), ty));
        (axiom, index)
    }

    /// Evaluates `program` and runs the solver until no further progress is made.
    pub fn elaborate(self: &Rc<Self>, program: &Program) -> TypedValue {
        let value = evaluate(program, self.clone());
        debug!(
            "elaborated program: {} errors, {} equations pending",
            self.errors.borrow().len(),
            self.manager.borrow().pending_equations()
        );
        value
    }

    /// Normal form of a closed term under every rule installed so far.
    pub fn reduce(&self, term: Term) -> Term {
        self.ctx.reduce(term)
    }

    /// Whether nothing went wrong and nothing is left undecided.
    pub fn solved(&self) -> bool {
        self.errors.borrow().is_empty() && self.manager.borrow().solved()
    }

    pub fn errors(&self) -> Vec<ElabError> {
        self.errors.borrow().clone()
    }

    /// Gives up on every undecided equation and returns all errors.
    ///
    /// Obligations still open are reported as stalled. The embeds are released, so
    /// that only terms referenced from the rule table stay alive.
    pub fn finish(&self) -> Vec<ElabError> {
        self.manager.borrow_mut().close();
        self.embeds.borrow_mut().clear();
        let errors = std::mem::take(&mut *self.errors.borrow_mut());
        debug!("session finished with {} errors", errors.len());
        errors
    }
}

impl EvaluatorInterface for Session {
    fn context(&self) -> Rc<BasicContext> {
        self.ctx.clone()
    }

    fn register_type(&self, symbol: &Term, ty: Term) {
        self.ctx.register_type(symbol, ty)
    }

    fn register_declaration(&self, declaration: &Term) {
        self.ctx.register_declaration(declaration)
    }

    fn register_definable_indeterminate(&self, declaration: &Term) {
        self.manager.borrow_mut().register_definable_indeterminate(declaration)
    }

    fn is_definable(&self, declaration: &Term) -> bool {
        declaration.as_declaration().is_some_and(|id| self.manager.borrow().is_definable(id))
    }

    fn add_rule(&self, rule: Rule) {
        self.ctx.add_rule(rule)
    }

    fn explain_variable(&self, declaration: &Term, explanation: VariableExplanation) {
        self.ctx.name(declaration, explanation.to_string())
    }

    fn solve(&self, stack: &Stack, lhs: Term, rhs: Term) -> Future<EquationResult> {
        self.manager.borrow_mut().register_equation(Equation::new(stack.clone(), lhs, rhs))
    }

    fn solve_no_deduce(&self, stack: &Stack, lhs: Term, rhs: Term) -> Future<EquationResult> {
        self.manager.borrow_mut().register_equation(Equation::check(stack.clone(), lhs, rhs))
    }

    fn cast(&self, cast: Cast) -> Future<EquationResult> {
        self.manager.borrow_mut().register_cast(cast)
    }

    fn function_cast(&self, cast: FunctionCast) -> Future<FunctionCastResult> {
        self.manager.borrow_mut().register_function_cast(cast)
    }

    fn rule(&self, request: RuleRequest) -> RuleFutures {
        self.manager.borrow_mut().register_rule(request)
    }

    fn embed(&self, index: usize) -> TypedValue {
        match self.embeds.borrow().get(index) {
            Some(value) => value.clone(),
            None => panic!("no value is embedded at {index}"),
        }
    }

    fn report_error(&self, error: ElabError) {
        debug!("{error}");
        self.errors.borrow_mut().push(error);
    }

    fn close_interface(&self) {
        self.manager.borrow_mut().run();
    }
}
