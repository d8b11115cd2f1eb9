use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::debug;

use kiln_lang_term::{BasicContext, LocalContext, Pattern, Rule, Term, TermKind};

/// A dependent telescope `(x0 : F0) (x1 : F1 x0) ... (x(d-1) : F(d-1) x0 ... x(d-2))`.
///
/// Instead of one Pi former per arity, the telescope is represented by two terms:
///
/// * `fam`, the type of type families over the telescope (`F0 -> ... -> Type`),
/// * `var`, mapping such a family `F` to the type `(x0 : F0) -> ... -> F x0 ...`.
///
/// The empty telescope has `fam = Type` and `var = id Type`. Extending by a family
/// `F` installs rules for five fresh declarations so that the new `var` unfolds
/// into the old one applied to a fibration over `F`.
///
/// Stacks are persistent: extending one leaves it untouched, and frames are shared
/// between all telescopes built on top of them. Each frame also carries a local
/// equality context holding the assumptions made by pattern matching.
#[derive(Clone)]
pub struct Stack(Rc<Frame>);

struct Frame {
    ctx: Rc<BasicContext>,
    depth: usize,
    fam: Term,
    var: Term,
    local: Rc<RefCell<LocalContext>>,
    link: Option<Link>,
}

enum Link {
    Extension { parent: Stack, family: Term },
    Assumption { parent: Stack, lhs: Term, rhs: Term },
}

impl Stack {
    pub fn empty(ctx: Rc<BasicContext>) -> Self {
        let p = &ctx.primitives;
        let fam = p.typ.clone();
        let var = ctx.arena.apply(p.id.clone(), p.typ.clone());
        Stack(Rc::new(Frame {
            ctx: ctx.clone(),
            depth: 0,
            fam,
            var,
            local: Rc::new(RefCell::new(LocalContext::new())),
            link: None,
        }))
    }

    pub fn context(&self) -> &Rc<BasicContext> {
        &self.0.ctx
    }

    pub fn depth(&self) -> usize {
        self.0.depth
    }

    /// The type of type families over this telescope.
    pub fn fam(&self) -> &Term {
        &self.0.fam
    }

    pub fn var(&self) -> &Term {
        &self.0.var
    }

    /// Adds an argument whose type is `family`, a type mentioning the arguments
    /// `$0 ... $(depth - 1)`.
    pub fn extend(&self, family: Term) -> Stack {
        let ctx = &self.0.ctx;
        let arena = &ctx.arena;
        let p = &ctx.primitives;
        let depth = self.depth();

        let extension_ext = ctx.declare();
        let inner_constant_family = ctx.declare();
        let family_over = ctx.declare();
        let as_fibration = ctx.declare();
        let var_p = ctx.declare();
        for (declaration, name) in [
            (&extension_ext, "ext"),
            (&inner_constant_family, "icf"),
            (&family_over, "fam_over"),
            (&as_fibration, "fib"),
            (&var_p, "var"),
        ] {
            ctx.name(declaration, format!("{name}{depth}"));
        }

        // extension_ext $0 .. $(d-1) := F
        ctx.add_rule(Rule {
            pattern: Pattern::lambda(extension_ext.clone(), depth),
            replacement: family.clone(),
        });
        // inner_constant_family $0 .. $d := Type
        ctx.add_rule(Rule {
            pattern: Pattern::lambda(inner_constant_family.clone(), depth + 1),
            replacement: p.typ.clone(),
        });
        // family_over $0 .. $(d-1) := arrow F (inner_constant_family $0 .. $(d-1))
        ctx.add_rule(Rule {
            pattern: Pattern::lambda(family_over.clone(), depth),
            replacement: p.arrow_of(
                arena,
                family.clone(),
                arena.apply_arguments(inner_constant_family, depth),
            ),
        });
        // as_fibration $0 $1 .. $d := arrow (extension_ext $1 .. $d) ($0 $1 .. $d)
        let shifted =
            |head: Term| arena.apply_all(head, (1..=depth).map(|index| arena.argument(index)));
        ctx.add_rule(Rule {
            pattern: Pattern::lambda(as_fibration.clone(), depth + 1),
            replacement: p.arrow_of(arena, shifted(extension_ext), shifted(arena.argument(0))),
        });
        // var_p $0 := var (as_fibration $0)
        let fibration = arena.apply(as_fibration, arena.argument(0));
        ctx.add_rule(Rule {
            pattern: Pattern::lambda(var_p.clone(), 1),
            replacement: arena.apply(self.0.var.clone(), fibration),
        });

        Stack(Rc::new(Frame {
            ctx: ctx.clone(),
            depth: depth + 1,
            fam: arena.apply(self.0.var.clone(), family_over),
            var: var_p,
            local: self.0.local.clone(),
            link: Some(Link::Extension { parent: self.clone(), family }),
        }))
    }

    /// A sibling telescope additionally assuming `lhs ~ rhs`.
    ///
    /// Contradictory assumptions are recorded; every equation below an
    /// inconsistent telescope holds vacuously.
    pub fn extend_by_assumption(&self, lhs: Term, rhs: Term) -> Stack {
        let ctx = &self.0.ctx;
        let mut local = self.0.local.borrow().clone();
        if let Err(err) = local.assume_equal(lhs.clone(), rhs.clone(), ctx) {
            debug!("{err}");
        }
        Stack(Rc::new(Frame {
            ctx: ctx.clone(),
            depth: self.0.depth,
            fam: self.0.fam.clone(),
            var: self.0.var.clone(),
            local: Rc::new(RefCell::new(local)),
            link: Some(Link::Assumption { parent: self.clone(), lhs, rhs }),
        }))
    }

    /// `var v` for a fresh declaration `v $0 .. $(depth - 1) := expr`.
    pub fn instance_of_type_family(&self, expr: Term) -> Term {
        let ctx = &self.0.ctx;
        let instance = ctx.declare();
        let pattern = Pattern::lambda(instance.clone(), self.depth());
        ctx.add_rule(Rule { pattern, replacement: expr });
        ctx.register_type(&instance, self.0.fam.clone());
        ctx.arena.apply(self.0.var.clone(), instance)
    }

    /// `x $0 .. $(depth - 1)`
    pub fn apply_args(&self, x: Term) -> Term {
        self.0.ctx.arena.apply_arguments(x, self.depth())
    }

    /// The type the telescope assigns to argument `index`.
    pub fn type_of_arg(&self, index: usize) -> Option<Term> {
        let mut current = self;
        loop {
            match &current.0.link {
                Some(Link::Extension { parent, family }) => {
                    if parent.depth() == index {
                        return Some(family.clone());
                    }
                    current = parent;
                }
                Some(Link::Assumption { parent, .. }) => current = parent,
                None => return None,
            }
        }
    }

    /// Assumptions in scope, innermost first.
    pub fn assumptions(&self) -> Vec<(Term, Term)> {
        let mut result = Vec::new();
        let mut current = self;
        while let Some(link) = &current.0.link {
            current = match link {
                Link::Extension { parent, .. } => parent,
                Link::Assumption { parent, lhs, rhs } => {
                    result.push((lhs.clone(), rhs.clone()));
                    parent
                }
            };
        }
        result
    }

    pub fn is_inconsistent(&self) -> bool {
        self.0.local.borrow().is_inconsistent()
    }

    /// Normal form of `term` under the global rules and the local assumptions.
    pub fn reduce(&self, term: Term) -> Term {
        let ctx = &self.0.ctx;
        {
            let mut local = self.0.local.borrow_mut();
            if local.has_assumptions() && local.generation() != ctx.rule_generation() {
                local.canonicalize(ctx);
            }
        }
        self.0.local.borrow().reduce(term, ctx)
    }

    /// Removes the placeholders [Stack::reduce] may introduce.
    ///
    /// Panics if a conglomerate survives: they must never reach an installed rule.
    pub fn eliminate_conglomerates(&self, term: Term) -> Term {
        let result = self.0.local.borrow().eliminate_conglomerates(&term, &self.0.ctx.arena);
        assert!(!result.contains_conglomerate(), "conglomerate leaked out of {term:?}");
        result
    }

    /// Reduces and eliminates conglomerates.
    pub fn reduce_clean(&self, term: Term) -> Term {
        let reduced = self.reduce(term);
        self.eliminate_conglomerates(reduced)
    }

    /// The type of `term`, read off the registered types of its head and the
    /// arrows it is applied through.
    pub fn type_of(&self, term: &Term) -> Option<Term> {
        let ctx = &self.0.ctx;
        let unfolded = term.unfold();
        let mut ty = match unfolded.head.kind() {
            TermKind::Argument(index) => self.type_of_arg(*index)?,
            TermKind::Axiom(_) | TermKind::Declaration(_) | TermKind::Data(_) => {
                ctx.type_of_symbol(&unfolded.head)?
            }
            TermKind::Apply(..) | TermKind::Conglomerate(_) => return None,
        };
        for arg in unfolded.args {
            let reduced = self.reduce_clean(ty);
            let (_, codomain) = ctx.primitives.as_arrow(&reduced)?;
            ty = ctx.arena.apply(codomain, arg);
        }
        Some(ty)
    }

    /// Splits the reduced type of `function` into domain and codomain.
    pub fn function_parts(&self, function: &Term) -> Option<(Term, Term)> {
        let ty = self.type_of(function)?;
        let reduced = self.reduce_clean(ty);
        self.0.ctx.primitives.as_arrow(&reduced)
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("depth", &self.depth())
            .field("assumptions", &self.assumptions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use kiln_lang_term::{Arena, DataKind, DataLeaf};

    use super::*;

    fn context() -> Rc<BasicContext> {
        Rc::new(BasicContext::new(Arena::new()))
    }

    #[test]
    fn empty_stack_var_is_identity() {
        let ctx = context();
        let stack = Stack::empty(ctx.clone());
        let nat = ctx.arena.axiom();
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.reduce(ctx.arena.apply(stack.var().clone(), nat.clone())), nat);
        assert_eq!(stack.fam(), &ctx.primitives.typ);
    }

    #[test]
    fn extension_types_the_new_argument() {
        let ctx = context();
        let arena = &ctx.arena;
        let nat = arena.axiom();
        let vec = arena.axiom();
        let stack = Stack::empty(ctx.clone()).extend(nat.clone());
        let family = arena.apply(vec, arena.argument(0));
        let deeper = stack.extend(family.clone());

        assert_eq!(deeper.depth(), 2);
        assert_eq!(deeper.type_of_arg(0), Some(nat));
        assert_eq!(deeper.type_of_arg(1), Some(family));
        assert_eq!(deeper.type_of_arg(2), None);

        let x = arena.declaration();
        let applied = arena.apply_all(x.clone(), [arena.argument(0), arena.argument(1)]);
        assert_eq!(deeper.apply_args(x), applied);
    }

    #[test]
    fn instances_are_functions_over_the_telescope() {
        let ctx = context();
        let arena = &ctx.arena;
        let p = &ctx.primitives;
        let nat = arena.axiom();
        let pos = arena.axiom();
        let stack = Stack::empty(ctx.clone()).extend(nat.clone());

        // (n : nat) -> pos n
        let ty = stack.instance_of_type_family(arena.apply(pos.clone(), arena.argument(0)));
        let reduced = stack.reduce(ty);
        let (domain, codomain) = p.as_arrow(&reduced).unwrap();
        assert_eq!(domain, nat);
        let zero = arena.axiom();
        assert_eq!(stack.reduce(arena.apply(codomain, zero.clone())), arena.apply(pos, zero));
    }

    #[test]
    fn two_level_instance_unfolds_in_order() {
        let ctx = context();
        let arena = &ctx.arena;
        let p = &ctx.primitives;
        let nat = arena.axiom();
        let vec = arena.axiom();
        let out = arena.axiom();
        let stack = Stack::empty(ctx.clone())
            .extend(nat.clone())
            .extend(arena.apply(vec.clone(), arena.argument(0)));

        let family = arena.apply_all(out.clone(), [arena.argument(0), arena.argument(1)]);
        let ty = stack.instance_of_type_family(family);
        let (dom0, cod0) = p.as_arrow(&stack.reduce(ty)).unwrap();
        assert_eq!(dom0, nat);
        let (a, b) = (arena.axiom(), arena.axiom());
        let (dom1, cod1) = p.as_arrow(&stack.reduce(arena.apply(cod0, a.clone()))).unwrap();
        assert_eq!(dom1, arena.apply(vec, a.clone()));
        assert_eq!(stack.reduce(arena.apply(cod1, b.clone())), arena.apply_all(out, [a, b]));
    }

    #[test]
    fn fam_is_the_type_of_families() {
        let ctx = context();
        let arena = &ctx.arena;
        let p = &ctx.primitives;
        let nat = arena.axiom();
        let stack = Stack::empty(ctx.clone()).extend(nat.clone());
        let (domain, codomain) = p.as_arrow(&stack.reduce(stack.fam().clone())).unwrap();
        assert_eq!(domain, nat);
        assert_eq!(stack.reduce(arena.apply(codomain, arena.axiom())), p.typ);
    }

    #[test]
    fn assumptions_fork_the_local_context() {
        let ctx = context();
        let arena = &ctx.arena;
        let nat = arena.axiom();
        let zero = arena.axiom();
        let stack = Stack::empty(ctx.clone()).extend(nat);
        let assumed = stack.extend_by_assumption(arena.argument(0), zero.clone());

        assert_eq!(assumed.reduce(arena.argument(0)), zero);
        assert_eq!(stack.reduce(arena.argument(0)), arena.argument(0));
        assert_eq!(assumed.depth(), stack.depth());
        assert_eq!(assumed.assumptions(), vec![(arena.argument(0), zero)]);
    }

    #[test]
    fn type_of_applications_peels_arrows() {
        let ctx = context();
        let arena = &ctx.arena;
        let p = &ctx.primitives;
        let nat = arena.axiom();
        let succ = arena.axiom();
        ctx.register_type(&succ, p.function_type(arena, nat.clone(), nat.clone()));
        let stack = Stack::empty(ctx.clone()).extend(nat.clone());
        let term = arena.apply(succ, arena.argument(0));
        assert_eq!(stack.reduce(stack.type_of(&term).unwrap()), nat);
        assert_eq!(stack.type_of(&arena.argument(0)), Some(nat));
    }

    #[test]
    fn data_leaves_have_the_type_of_their_kind() {
        let ctx = context();
        let arena = &ctx.arena;
        let int = arena.axiom();
        ctx.register_data_type(DataKind::Integer, int.clone());
        let stack = Stack::empty(ctx.clone());
        assert_eq!(stack.type_of(&arena.data(DataLeaf::Integer(3))), Some(int));
        assert_eq!(stack.type_of(&arena.data(DataLeaf::Text("three".into()))), None);
    }
}
