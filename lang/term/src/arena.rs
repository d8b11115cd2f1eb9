use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::HashMap;

/// Identity of an axiom or declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u64);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque primitive data carried by a leaf.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataLeaf {
    Integer(i64),
    Text(Rc<str>),
}

impl DataLeaf {
    pub fn kind(&self) -> DataKind {
        match self {
            DataLeaf::Integer(_) => DataKind::Integer,
            DataLeaf::Text(_) => DataKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Integer,
    Text,
}

#[derive(Debug)]
pub enum TermKind {
    Apply(Term, Term),
    /// A bound variable, numbered from the root of the telescope (de Bruijn level).
    Argument(usize),
    Axiom(SymbolId),
    Declaration(SymbolId),
    Data(DataLeaf),
    /// Placeholder for an equivalence class of a local equality context.
    Conglomerate(usize),
}

struct TermNode {
    id: u64,
    kind: TermKind,
    key: NodeKey,
    arena: Weak<ArenaInner>,
}

impl Drop for TermNode {
    fn drop(&mut self) {
        let Some(arena) = self.arena.upgrade() else {
            return;
        };
        // A node dropped while the table is borrowed leaves a dead entry behind,
        // which the next lookup of the same shape replaces.
        if let Ok(mut table) = arena.table.try_borrow_mut() {
            if table.get(&self.key).is_some_and(|weak| weak.strong_count() == 0) {
                table.remove(&self.key);
            }
        }
    }
}

/// An owned handle to a hash-consed term.
///
/// Cloning retains the node and dropping releases it. Since every shape exists at
/// most once per arena, equality and hashing are by node identity.
#[derive(Clone)]
pub struct Term(Rc<TermNode>);

impl Term {
    pub fn kind(&self) -> &TermKind {
        &self.0.kind
    }

    pub fn as_apply(&self) -> Option<(&Term, &Term)> {
        match self.kind() {
            TermKind::Apply(lhs, rhs) => Some((lhs, rhs)),
            _ => None,
        }
    }

    pub fn as_argument(&self) -> Option<usize> {
        match self.kind() {
            TermKind::Argument(index) => Some(*index),
            _ => None,
        }
    }

    pub fn as_axiom(&self) -> Option<SymbolId> {
        match self.kind() {
            TermKind::Axiom(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_declaration(&self) -> Option<SymbolId> {
        match self.kind() {
            TermKind::Declaration(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_conglomerate(&self) -> Option<usize> {
        match self.kind() {
            TermKind::Conglomerate(index) => Some(*index),
            _ => None,
        }
    }

    /// The id of the axiom or declaration this term is, if any.
    pub fn symbol(&self) -> Option<SymbolId> {
        self.as_axiom().or_else(|| self.as_declaration())
    }

    /// The leftmost term of the application spine.
    pub fn head(&self) -> &Term {
        let mut current = self;
        while let TermKind::Apply(lhs, _) = current.kind() {
            current = lhs;
        }
        current
    }

    /// Splits the term into its head and the arguments applied to it.
    pub fn unfold(&self) -> Unfolded {
        let mut args = Vec::new();
        let mut current = self;
        while let TermKind::Apply(lhs, rhs) = current.kind() {
            args.push(rhs.clone());
            current = lhs;
        }
        args.reverse();
        Unfolded { head: current.clone(), args }
    }

    pub fn contains_conglomerate(&self) -> bool {
        match self.kind() {
            TermKind::Apply(lhs, rhs) => lhs.contains_conglomerate() || rhs.contains_conglomerate(),
            TermKind::Conglomerate(_) => true,
            _ => false,
        }
    }

    /// Calls `f` on every declaration occurring in the term.
    pub fn visit_declarations(&self, f: &mut impl FnMut(SymbolId)) {
        match self.kind() {
            TermKind::Apply(lhs, rhs) => {
                lhs.visit_declarations(f);
                rhs.visit_declarations(f);
            }
            TermKind::Declaration(id) => f(*id),
            _ => {}
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            TermKind::Apply(lhs, rhs) => write!(f, "({lhs:?} {rhs:?})"),
            TermKind::Argument(index) => write!(f, "${index}"),
            TermKind::Axiom(id) => write!(f, "ax{id}"),
            TermKind::Declaration(id) => write!(f, "d{id}"),
            TermKind::Data(DataLeaf::Integer(n)) => write!(f, "{n}"),
            TermKind::Data(DataLeaf::Text(s)) => write!(f, "{s:?}"),
            TermKind::Conglomerate(index) => write!(f, "#{index}"),
        }
    }
}

/// A term split into its head and argument spine.
#[derive(Debug, Clone)]
pub struct Unfolded {
    pub head: Term,
    pub args: Vec<Term>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Apply(u64, u64),
    Argument(usize),
    Axiom(SymbolId),
    Declaration(SymbolId),
    Data(DataLeaf),
    Conglomerate(usize),
}

#[derive(Default)]
struct ArenaInner {
    table: RefCell<HashMap<NodeKey, Weak<TermNode>>>,
    next_node: Cell<u64>,
    next_symbol: Cell<u64>,
}

/// The hash-consing table every term is created through.
///
/// The table only holds weak references, so a node lives exactly as long as some
/// owned [Term] refers to it. Cloning an arena yields another handle to the same
/// table.
#[derive(Clone, Default)]
pub struct Arena {
    inner: Rc<ArenaInner>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&self, key: NodeKey, kind: impl FnOnce() -> TermKind) -> Term {
        let existing = self.inner.table.borrow().get(&key).and_then(Weak::upgrade);
        if let Some(node) = existing {
            return Term(node);
        }
        let id = self.inner.next_node.get();
        self.inner.next_node.set(id + 1);
        let node = Rc::new(TermNode {
            id,
            kind: kind(),
            key: key.clone(),
            arena: Rc::downgrade(&self.inner),
        });
        self.inner.table.borrow_mut().insert(key, Rc::downgrade(&node));
        Term(node)
    }

    fn fresh_symbol(&self) -> SymbolId {
        let id = self.inner.next_symbol.get();
        self.inner.next_symbol.set(id + 1);
        SymbolId(id)
    }

    pub fn apply(&self, lhs: Term, rhs: Term) -> Term {
        let key = NodeKey::Apply(lhs.0.id, rhs.0.id);
        self.intern(key, || TermKind::Apply(lhs, rhs))
    }

    pub fn argument(&self, index: usize) -> Term {
        self.intern(NodeKey::Argument(index), || TermKind::Argument(index))
    }

    /// A new axiom, distinct from every other term.
    pub fn axiom(&self) -> Term {
        let id = self.fresh_symbol();
        self.intern(NodeKey::Axiom(id), || TermKind::Axiom(id))
    }

    /// A new declaration, distinct from every other term.
    pub fn declaration(&self) -> Term {
        let id = self.fresh_symbol();
        self.intern(NodeKey::Declaration(id), || TermKind::Declaration(id))
    }

    pub fn data(&self, leaf: DataLeaf) -> Term {
        self.intern(NodeKey::Data(leaf.clone()), || TermKind::Data(leaf))
    }

    pub fn conglomerate(&self, index: usize) -> Term {
        self.intern(NodeKey::Conglomerate(index), || TermKind::Conglomerate(index))
    }

    pub fn apply_all(&self, head: Term, args: impl IntoIterator<Item = Term>) -> Term {
        args.into_iter().fold(head, |acc, arg| self.apply(acc, arg))
    }

    /// `head $0 $1 ... $(count - 1)`
    pub fn apply_arguments(&self, head: Term, count: usize) -> Term {
        self.apply_all(head, (0..count).map(|index| self.argument(index)))
    }

    /// Replaces every `Argument(i)` with `i < args.len()` by `args[i]`.
    ///
    /// Arguments beyond the substitution are left untouched.
    pub fn substitute(&self, term: &Term, args: &[Term]) -> Term {
        let mut memo = HashMap::default();
        self.substitute_memo(term, args, &mut memo)
    }

    fn substitute_memo(&self, term: &Term, args: &[Term], memo: &mut HashMap<Term, Term>) -> Term {
        if let Some(done) = memo.get(term) {
            return done.clone();
        }
        let result = match term.kind() {
            TermKind::Apply(lhs, rhs) => {
                let lhs = self.substitute_memo(lhs, args, memo);
                let rhs = self.substitute_memo(rhs, args, memo);
                self.apply(lhs, rhs)
            }
            TermKind::Argument(index) if *index < args.len() => args[*index].clone(),
            _ => term.clone(),
        };
        memo.insert(term.clone(), result.clone());
        result
    }

    /// Rewrites every argument through `f`, failing as soon as `f` does.
    pub fn try_map_arguments(
        &self,
        term: &Term,
        f: &mut impl FnMut(usize) -> Option<Term>,
    ) -> Option<Term> {
        match term.kind() {
            TermKind::Apply(lhs, rhs) => {
                let lhs = self.try_map_arguments(lhs, f)?;
                let rhs = self.try_map_arguments(rhs, f)?;
                Some(self.apply(lhs, rhs))
            }
            TermKind::Argument(index) => f(*index),
            _ => Some(term.clone()),
        }
    }

    /// Number of nodes still referenced by some owned handle.
    pub fn live_terms(&self) -> usize {
        self.inner.table.borrow().values().filter(|weak| weak.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.live_terms() == 0
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena").field("live_terms", &self.live_terms()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_consing_shares_nodes() {
        let arena = Arena::new();
        let f = arena.axiom();
        let a = arena.apply(f.clone(), arena.argument(0));
        let b = arena.apply(f.clone(), arena.argument(0));
        assert_eq!(a, b);
        assert_ne!(a, arena.apply(f, arena.argument(1)));
    }

    #[test]
    fn fresh_symbols_are_distinct() {
        let arena = Arena::new();
        assert_ne!(arena.axiom(), arena.axiom());
        assert_ne!(arena.declaration(), arena.declaration());
    }

    #[test]
    fn unfold_splits_spine() {
        let arena = Arena::new();
        let f = arena.declaration();
        let term = arena.apply_arguments(f.clone(), 3);
        let unfolded = term.unfold();
        assert_eq!(unfolded.head, f);
        assert_eq!(unfolded.args, vec![arena.argument(0), arena.argument(1), arena.argument(2)]);
        assert_eq!(term.head(), &f);
    }

    #[test]
    fn substitute_replaces_bound_arguments() {
        let arena = Arena::new();
        let f = arena.axiom();
        let x = arena.axiom();
        let term = arena.apply_all(f.clone(), [arena.argument(1), arena.argument(2)]);
        let result = arena.substitute(&term, &[arena.argument(7), x.clone()]);
        assert_eq!(result, arena.apply_all(f, [x, arena.argument(2)]));
    }

    #[test]
    fn released_terms_leave_the_arena() {
        let arena = Arena::new();
        {
            let f = arena.declaration();
            let _term = arena.apply_arguments(f, 2);
            assert_eq!(arena.live_terms(), 5);
        }
        assert!(arena.is_empty());
        assert_eq!(arena.inner.table.borrow().len(), 0);
    }

    #[test]
    fn temporary_terms_do_not_grow_the_table() {
        let arena = Arena::new();
        let f = arena.axiom();
        for index in 0..10_000 {
            let term = arena.apply(f.clone(), arena.argument(index));
            assert_eq!(term.unfold().head, f);
        }
        assert_eq!(arena.live_terms(), 1);
        assert_eq!(arena.inner.table.borrow().len(), 1);
    }

    #[test]
    fn shapes_are_shared_again_after_release() {
        let arena = Arena::new();
        let f = arena.axiom();
        let first = arena.apply(f.clone(), arena.argument(0));
        drop(first);
        let again = arena.apply(f.clone(), arena.argument(0));
        assert_eq!(again, arena.apply(f, arena.argument(0)));
        assert_eq!(arena.inner.table.borrow().len(), 3);
    }
}
