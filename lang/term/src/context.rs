use std::cell::RefCell;

use crate::{
    Arena, DataKind, NoHook, Names, Primitives, Reducer, Rule, RuleCollector, SymbolId, Term,
    TypeCollector,
};

/// The long-lived substrate shared by every component of an elaboration:
/// the arena, the global rule table, the registered types and the primitives.
///
/// Components access the tables through short-lived borrows; none is held across
/// a call that may install rules.
pub struct BasicContext {
    pub arena: Arena,
    pub rules: RefCell<RuleCollector>,
    pub types: RefCell<TypeCollector>,
    pub names: RefCell<Names>,
    pub primitives: Primitives,
}

impl BasicContext {
    pub fn new(arena: Arena) -> Self {
        let mut rules = RuleCollector::new();
        let mut types = TypeCollector::new();
        let mut names = Names::new();
        let primitives = Primitives::new(&arena, &mut rules, &mut types, &mut names);
        BasicContext {
            arena,
            rules: RefCell::new(rules),
            types: RefCell::new(types),
            names: RefCell::new(names),
            primitives,
        }
    }

    /// Normal form with respect to the global rules.
    pub fn reduce(&self, term: Term) -> Term {
        let rules = self.rules.borrow();
        Reducer::new(&self.arena, &rules, &NoHook).normalize(term)
    }

    /// A fresh declaration, registered in the rule table.
    pub fn declare(&self) -> Term {
        let declaration = self.arena.declaration();
        self.rules.borrow_mut().register_declaration(&declaration);
        declaration
    }

    pub fn register_declaration(&self, declaration: &Term) {
        self.rules.borrow_mut().register_declaration(declaration)
    }

    pub fn add_rule(&self, rule: Rule) {
        self.rules.borrow_mut().add_rule(rule)
    }

    pub fn has_rule(&self, id: SymbolId) -> bool {
        self.rules.borrow().has_rule(id)
    }

    pub fn rule_generation(&self) -> u64 {
        self.rules.borrow().generation()
    }

    pub fn depends_on(&self, term: &Term, id: SymbolId) -> bool {
        self.rules.borrow().term_depends_on(term, id)
    }

    pub fn register_type(&self, symbol: &Term, ty: Term) {
        self.types.borrow_mut().register_type(symbol, ty)
    }

    /// Gives every data leaf of `kind` the type `ty`.
    pub fn register_data_type(&self, kind: DataKind, ty: Term) {
        self.types.borrow_mut().register_data_type(kind, ty)
    }

    pub fn type_of_symbol(&self, symbol: &Term) -> Option<Term> {
        self.types.borrow().type_of(symbol)
    }

    pub fn name(&self, symbol: &Term, name: impl Into<String>) {
        self.names.borrow_mut().insert(symbol, name)
    }
}
