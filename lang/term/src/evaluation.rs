//! Local equality contexts.
//!
//! Matching a rule pattern introduces assumptions such as `$2 ~ succ $3` which only
//! hold below the pattern. A [LocalContext] records such assumptions as
//! equivalence classes of normal forms. Reduction in the context replaces every
//! member of a class by the class's rigid (axiom-headed) canonical form if it has
//! one, and by the placeholder `Conglomerate(class)` otherwise. Placeholders are
//! internal to the context and are removed again by
//! [LocalContext::eliminate_conglomerates].

use log::{trace, warn};
use thiserror::Error;

use crate::{Arena, BasicContext, HashMap, ReductionHook, Reducer, Term, TermKind};

const MAX_CANONICALIZATION_ROUNDS: usize = 16;

#[derive(Debug, Clone, Error)]
#[error("the assumption {lhs:?} ~ {rhs:?} contradicts the context")]
pub struct Inconsistent {
    pub lhs: Term,
    pub rhs: Term,
}

#[derive(Debug, Clone)]
struct Class {
    parent: usize,
    token: Term,
    /// Conglomerate-free representative.
    canonical: Term,
    /// Whether `canonical` is headed by an axiom or data leaf.
    rigid: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LocalContext {
    classes: Vec<Class>,
    keys: HashMap<Term, usize>,
    inconsistent: bool,
    generation: u64,
}

fn is_rigid(term: &Term) -> bool {
    matches!(term.head().kind(), TermKind::Axiom(_) | TermKind::Data(_))
}

impl LocalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether two distinct axiom heads have been assumed equal.
    pub fn is_inconsistent(&self) -> bool {
        self.inconsistent
    }

    pub fn has_assumptions(&self) -> bool {
        !self.classes.is_empty()
    }

    /// The rule table generation this context was last canonicalized against.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn find(&self, mut class: usize) -> usize {
        while self.classes[class].parent != class {
            class = self.classes[class].parent;
        }
        class
    }

    fn output(&self, class: usize) -> Term {
        let class = &self.classes[self.find(class)];
        if class.rigid { class.canonical.clone() } else { class.token.clone() }
    }

    pub fn reduce(&self, term: Term, ctx: &BasicContext) -> Term {
        let rules = ctx.rules.borrow();
        Reducer::new(&ctx.arena, &rules, self).normalize(term)
    }

    /// Replaces every conglomerate by the canonical member of its class.
    pub fn eliminate_conglomerates(&self, term: &Term, arena: &Arena) -> Term {
        match term.kind() {
            TermKind::Apply(lhs, rhs) => {
                let lhs = self.eliminate_conglomerates(lhs, arena);
                let rhs = self.eliminate_conglomerates(rhs, arena);
                arena.apply(lhs, rhs)
            }
            TermKind::Conglomerate(index) if *index < self.classes.len() => {
                self.classes[self.find(*index)].canonical.clone()
            }
            _ => term.clone(),
        }
    }

    /// Records `lhs ~ rhs`.
    ///
    /// Fails, and marks the context inconsistent, if the assumption equates
    /// applications of different axioms.
    pub fn assume_equal(
        &mut self,
        lhs: Term,
        rhs: Term,
        ctx: &BasicContext,
    ) -> Result<(), Inconsistent> {
        let lhs = self.reduce(lhs, ctx);
        let rhs = self.reduce(rhs, ctx);
        trace!("assuming {lhs:?} ~ {rhs:?}");
        self.merge(lhs, rhs, ctx)?;
        self.canonicalize(ctx);
        Ok(())
    }

    fn merge(&mut self, lhs: Term, rhs: Term, ctx: &BasicContext) -> Result<(), Inconsistent> {
        if lhs == rhs {
            return Ok(());
        }
        match (is_rigid(&lhs), is_rigid(&rhs)) {
            (true, true) => {
                let (left, right) = (lhs.unfold(), rhs.unfold());
                if left.head != right.head || left.args.len() != right.args.len() {
                    self.inconsistent = true;
                    return Err(Inconsistent { lhs, rhs });
                }
                for (x, y) in left.args.into_iter().zip(right.args) {
                    let x = self.reduce(x, ctx);
                    let y = self.reduce(y, ctx);
                    self.merge(x, y, ctx)?;
                }
                Ok(())
            }
            (true, false) => {
                let class = self.class_of(rhs, &ctx.arena);
                self.attach_rigid(class, lhs, ctx)
            }
            (false, true) => {
                let class = self.class_of(lhs, &ctx.arena);
                self.attach_rigid(class, rhs, ctx)
            }
            (false, false) => {
                let left = self.class_of(lhs, &ctx.arena);
                let right = self.class_of(rhs, &ctx.arena);
                self.union(left, right, ctx)
            }
        }
    }

    fn class_of(&mut self, term: Term, arena: &Arena) -> usize {
        if let Some(index) = term.as_conglomerate() {
            if index < self.classes.len() {
                return self.find(index);
            }
        }
        if let Some(&index) = self.keys.get(&term) {
            return self.find(index);
        }
        let index = self.classes.len();
        let canonical = self.eliminate_conglomerates(&term, arena);
        self.classes.push(Class {
            parent: index,
            token: arena.conglomerate(index),
            canonical,
            rigid: false,
        });
        self.keys.insert(term, index);
        index
    }

    fn attach_rigid(
        &mut self,
        class: usize,
        rigid: Term,
        ctx: &BasicContext,
    ) -> Result<(), Inconsistent> {
        let class = self.find(class);
        if self.classes[class].rigid {
            let existing = self.reduce(self.classes[class].canonical.clone(), ctx);
            return self.merge(existing, rigid, ctx);
        }
        let canonical = self.eliminate_conglomerates(&rigid, &ctx.arena);
        if self.mentions_class(&canonical, class) {
            warn!("dropping cyclic assumption on {canonical:?}");
            return Ok(());
        }
        self.classes[class].canonical = canonical;
        self.classes[class].rigid = true;
        Ok(())
    }

    fn union(&mut self, left: usize, right: usize, ctx: &BasicContext) -> Result<(), Inconsistent> {
        let (left, right) = (self.find(left), self.find(right));
        if left == right {
            return Ok(());
        }
        let (root, child) = if left < right { (left, right) } else { (right, left) };
        self.classes[child].parent = root;
        if !self.classes[child].rigid {
            return Ok(());
        }
        let canonical = self.classes[child].canonical.clone();
        if self.classes[root].rigid {
            let existing = self.reduce(self.classes[root].canonical.clone(), ctx);
            let canonical = self.reduce(canonical, ctx);
            return self.merge(existing, canonical, ctx);
        }
        if self.mentions_class(&canonical, root) {
            warn!("dropping cyclic assumption on {canonical:?}");
            return Ok(());
        }
        self.classes[root].canonical = canonical;
        self.classes[root].rigid = true;
        Ok(())
    }

    fn mentions_class(&self, term: &Term, class: usize) -> bool {
        let member = self.keys.get(term).map(|index| self.find(*index)) == Some(class)
            || term.as_conglomerate().is_some_and(|index| {
                index < self.classes.len() && self.find(index) == class
            });
        member
            || term.as_apply().is_some_and(|(lhs, rhs)| {
                self.mentions_class(lhs, class) || self.mentions_class(rhs, class)
            })
    }

    /// Re-normalizes the members of every class, so that members which became
    /// reducible (through new rules or later assumptions) are still recognized.
    pub fn canonicalize(&mut self, ctx: &BasicContext) {
        self.generation = ctx.rules.borrow().generation();
        if self.classes.is_empty() {
            return;
        }
        for _ in 0..MAX_CANONICALIZATION_ROUNDS {
            let mut pending = Vec::new();
            {
                let rules = ctx.rules.borrow();
                let mut reducer = Reducer::new(&ctx.arena, &rules, &*self);
                for (key, class) in &self.keys {
                    let plain = self.eliminate_conglomerates(key, &ctx.arena);
                    let fresh = reducer.normalize_spine(plain);
                    if &fresh != key {
                        pending.push((fresh, *class));
                    }
                }
            }
            let mut changed = false;
            for (fresh, class) in pending {
                let root = self.find(class);
                if self.keys.get(&fresh).map(|index| self.find(*index)) == Some(root) {
                    continue;
                }
                changed = true;
                // Failures mark the context inconsistent, which is all callers need.
                let _ = if is_rigid(&fresh) {
                    self.attach_rigid(root, fresh, ctx)
                } else if let Some(&other) = self.keys.get(&fresh) {
                    self.union(root, other, ctx)
                } else if let Some(other) = fresh.as_conglomerate() {
                    self.union(root, other, ctx)
                } else {
                    self.keys.insert(fresh, root);
                    Ok(())
                };
            }
            if !changed {
                return;
            }
        }
        warn!("local context did not settle after {MAX_CANONICALIZATION_ROUNDS} rounds");
    }
}

impl ReductionHook for LocalContext {
    fn rewrite(&self, term: &Term) -> Option<Term> {
        let class = match term.as_conglomerate() {
            Some(index) if index < self.classes.len() => index,
            Some(_) => return None,
            None => *self.keys.get(term)?,
        };
        Some(self.output(class))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assumed_arguments_share_a_conglomerate() {
        let ctx = BasicContext::new(Arena::new());
        let arena = &ctx.arena;
        let mut local = LocalContext::new();
        local.assume_equal(arena.argument(0), arena.argument(1), &ctx).unwrap();

        let lhs = local.reduce(arena.argument(0), &ctx);
        let rhs = local.reduce(arena.argument(1), &ctx);
        assert_eq!(lhs, rhs);
        assert!(lhs.contains_conglomerate());

        let eliminated = local.eliminate_conglomerates(&lhs, arena);
        assert!(!eliminated.contains_conglomerate());
        assert_eq!(local.reduce(eliminated, &ctx), lhs);
    }

    #[test]
    fn congruence_through_applications() {
        let ctx = BasicContext::new(Arena::new());
        let arena = &ctx.arena;
        let f = arena.declaration();
        let mut local = LocalContext::new();
        local.assume_equal(arena.argument(0), arena.argument(1), &ctx).unwrap();

        let lhs = local.reduce(arena.apply(f.clone(), arena.argument(0)), &ctx);
        let rhs = local.reduce(arena.apply(f, arena.argument(1)), &ctx);
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn rigid_assumptions_replace_members() {
        let ctx = BasicContext::new(Arena::new());
        let arena = &ctx.arena;
        let succ = arena.axiom();
        let mut local = LocalContext::new();
        let succ_one = arena.apply(succ.clone(), arena.argument(1));
        local.assume_equal(arena.argument(0), succ_one.clone(), &ctx).unwrap();
        assert_eq!(local.reduce(arena.argument(0), &ctx), succ_one);
    }

    #[test]
    fn rigid_assumptions_decompose() {
        let ctx = BasicContext::new(Arena::new());
        let arena = &ctx.arena;
        let pair = arena.axiom();
        let mut local = LocalContext::new();
        local
            .assume_equal(
                arena.apply_all(pair.clone(), [arena.argument(0), arena.argument(1)]),
                arena.apply_all(pair, [arena.argument(2), arena.argument(3)]),
                &ctx,
            )
            .unwrap();
        assert_eq!(local.reduce(arena.argument(0), &ctx), local.reduce(arena.argument(2), &ctx));
        assert_eq!(local.reduce(arena.argument(1), &ctx), local.reduce(arena.argument(3), &ctx));
        assert_ne!(local.reduce(arena.argument(0), &ctx), local.reduce(arena.argument(1), &ctx));
    }

    #[test]
    fn clashing_axioms_are_inconsistent() {
        let ctx = BasicContext::new(Arena::new());
        let arena = &ctx.arena;
        let mut local = LocalContext::new();
        assert!(local.assume_equal(arena.axiom(), arena.axiom(), &ctx).is_err());
        assert!(local.is_inconsistent());
    }
}
