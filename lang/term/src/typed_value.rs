use crate::{DataKind, HashMap, SymbolId, Term, TermKind};

/// A term together with its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedValue {
    pub value: Term,
    pub ty: Term,
}

impl TypedValue {
    pub fn new(value: Term, ty: Term) -> Self {
        TypedValue { value, ty }
    }
}

/// Types of axioms, declarations and data leaves.
#[derive(Debug, Default)]
pub struct TypeCollector {
    symbols: HashMap<SymbolId, Term>,
    data: HashMap<DataKind, Term>,
}

impl TypeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_type(&mut self, symbol: &Term, ty: Term) {
        match symbol.symbol() {
            Some(id) => {
                self.symbols.insert(id, ty);
            }
            None => panic!("cannot register a type for {symbol:?}"),
        }
    }

    pub fn register_data_type(&mut self, kind: DataKind, ty: Term) {
        self.data.insert(kind, ty);
    }

    /// The registered type of an axiom, declaration or data leaf.
    pub fn type_of(&self, term: &Term) -> Option<Term> {
        match term.kind() {
            TermKind::Axiom(id) | TermKind::Declaration(id) => self.symbols.get(id).cloned(),
            TermKind::Data(leaf) => self.data.get(&leaf.kind()).cloned(),
            _ => None,
        }
    }
}
