use crate::{HashMap, SymbolId, Term};

/// Human readable names of axioms and declarations, used when printing.
#[derive(Debug, Clone, Default)]
pub struct Names {
    names: HashMap<SymbolId, String>,
}

impl Names {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names `symbol` unless it already has a name.
    pub fn insert(&mut self, symbol: &Term, name: impl Into<String>) {
        if let Some(id) = symbol.symbol() {
            self.names.entry(id).or_insert_with(|| name.into());
        }
    }

    pub fn get(&self, id: SymbolId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }
}
