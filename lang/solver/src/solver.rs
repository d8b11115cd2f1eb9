//! One deduction step on a single equation.
//!
//! The rules are tried in a fixed priority order and at most one of them fires per
//! step:
//!
//! 1. definition extraction, `V a0 .. ak =?= t` with `V` an indeterminate
//! 2. deepening, when either side still expects arguments
//! 3. symmetric explosion of two head-closed sides
//! 4. asymmetric explosion of an indeterminate against a head-closed side
//! 5. judgmental equality
//!
//! An equation none of these applies to is stalled. Its head may still become
//! reducible once some indeterminate gets defined.

use log::{debug, trace};

use kiln_lang_term::{
    HashMap, HashSet, Pattern, Rule, SymbolId, Term, TermKind, is_head_closed, is_lambda_like,
};

use crate::{Equation, Stack};

#[derive(Debug)]
pub enum Step {
    Solved,
    Failed,
    Stalled,
    /// The equation holds iff all of the derived equations hold.
    Derived(Vec<Equation>),
}

/// The flexible side of an equation: an indeterminate applied to distinct
/// arguments.
struct Flex {
    head: Term,
    id: SymbolId,
    /// Maps the level of each applied argument to its position.
    slots: HashMap<usize, usize>,
    args: Vec<Term>,
}

pub struct Solver<'a> {
    definable: &'a mut HashSet<SymbolId>,
}

impl<'a> Solver<'a> {
    pub fn new(definable: &'a mut HashSet<SymbolId>) -> Self {
        Solver { definable }
    }

    pub fn step(&mut self, equation: &Equation) -> Step {
        let stack = &equation.stack;
        if stack.is_inconsistent() {
            trace!("vacuous equation below inconsistent assumptions");
            return Step::Solved;
        }
        let lhs = stack.reduce(equation.lhs.clone());
        let rhs = stack.reduce(equation.rhs.clone());

        if equation.deduce {
            if let Some(step) = self.extract_definition(stack, &lhs, &rhs) {
                return step;
            }
            if let Some(step) = self.extract_definition(stack, &rhs, &lhs) {
                return step;
            }
        }
        if let Some(step) = deepen(equation, &lhs, &rhs) {
            return step;
        }
        if let Some(step) = explode_symmetric(equation, &lhs, &rhs) {
            return step;
        }
        if equation.deduce {
            if let Some(step) = self.explode_asymmetric(equation, &lhs, &rhs) {
                return step;
            }
            if let Some(step) = self.explode_asymmetric(equation, &rhs, &lhs) {
                return step;
            }
        }
        if lhs == rhs { Step::Solved } else { Step::Stalled }
    }

    fn flex(&self, term: &Term) -> Option<Flex> {
        let unfolded = term.unfold();
        let id = unfolded.head.as_declaration()?;
        if !self.definable.contains(&id) {
            return None;
        }
        let mut slots = HashMap::default();
        for (position, arg) in unfolded.args.iter().enumerate() {
            if slots.insert(arg.as_argument()?, position).is_some() {
                return None;
            }
        }
        Some(Flex { head: unfolded.head, id, slots, args: unfolded.args })
    }

    fn define(&mut self, stack: &Stack, flex: &Flex, replacement: Term) {
        let ctx = stack.context();
        debug!("defining d{} := {replacement:?}", flex.id);
        self.definable.remove(&flex.id);
        ctx.add_rule(Rule {
            pattern: Pattern::lambda(flex.head.clone(), flex.args.len()),
            replacement,
        });
    }

    fn extract_definition(&mut self, stack: &Stack, pattern: &Term, value: &Term) -> Option<Step> {
        let flex = self.flex(pattern)?;
        let ctx = stack.context();
        let value = stack.eliminate_conglomerates(value.clone());
        if ctx.depends_on(&value, flex.id) {
            return None;
        }
        let arena = &ctx.arena;
        let replacement = arena.try_map_arguments(&value, &mut |index| {
            flex.slots.get(&index).map(|slot| arena.argument(*slot))
        })?;
        self.define(stack, &flex, replacement);
        Some(Step::Solved)
    }

    fn explode_asymmetric(
        &mut self,
        equation: &Equation,
        pattern: &Term,
        rigid: &Term,
    ) -> Option<Step> {
        if !is_head_closed(rigid) {
            return None;
        }
        let flex = self.flex(pattern)?;
        let stack = &equation.stack;
        let ctx = stack.context().clone();
        let arena = &ctx.arena;
        let rigid = stack.eliminate_conglomerates(rigid.clone());
        let target = rigid.unfold();
        let head = match target.head.kind() {
            TermKind::Argument(index) => match flex.slots.get(index) {
                Some(slot) => arena.argument(*slot),
                None => {
                    trace!("{pattern:?} cannot mention the argument ${index}");
                    return Some(Step::Failed);
                }
            },
            _ => target.head.clone(),
        };
        if ctx.depends_on(&rigid, flex.id) {
            return None;
        }

        let fresh: Vec<Term> = target
            .args
            .iter()
            .map(|_| {
                let variable = ctx.declare();
                if let Some(id) = variable.as_declaration() {
                    self.definable.insert(id);
                }
                variable
            })
            .collect();
        let replacement = arena.apply_all(
            head,
            fresh.iter().map(|variable| arena.apply_arguments(variable.clone(), flex.args.len())),
        );
        self.define(stack, &flex, replacement);

        let exploded = stack.reduce(pattern.clone());
        assert_eq!(
            exploded.head(),
            &target.head,
            "explosion of {pattern:?} did not produce the head of {rigid:?}"
        );
        let children = fresh
            .into_iter()
            .zip(target.args)
            .map(|(variable, arg)| {
                equation.derive(arena.apply_all(variable, flex.args.iter().cloned()), arg)
            })
            .collect();
        Some(Step::Derived(children))
    }
}

fn deepen(equation: &Equation, lhs: &Term, rhs: &Term) -> Option<Step> {
    let stack = &equation.stack;
    let ctx = stack.context();
    let applicable = {
        let rules = ctx.rules.borrow();
        is_lambda_like(lhs, &rules) || is_lambda_like(rhs, &rules)
    };
    if !applicable {
        return None;
    }
    let arena = &ctx.arena;
    let argument = arena.argument(stack.depth());
    let deeper = stack.extend(arena.axiom());
    trace!("deepening to depth {}", deeper.depth());
    Some(Step::Derived(vec![Equation {
        lhs: arena.apply(lhs.clone(), argument.clone()),
        rhs: arena.apply(rhs.clone(), argument),
        stack: deeper,
        deduce: equation.deduce,
    }]))
}

fn explode_symmetric(equation: &Equation, lhs: &Term, rhs: &Term) -> Option<Step> {
    if !is_head_closed(lhs) || !is_head_closed(rhs) {
        return None;
    }
    let (left, right) = (lhs.unfold(), rhs.unfold());
    if left.head != right.head || left.args.len() != right.args.len() {
        return Some(Step::Failed);
    }
    if left.args.is_empty() {
        return Some(Step::Solved);
    }
    let children =
        left.args.into_iter().zip(right.args).map(|(x, y)| equation.derive(x, y)).collect();
    Some(Step::Derived(children))
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use kiln_lang_term::{Arena, BasicContext, DataLeaf};

    use super::*;

    struct Fixture {
        ctx: Rc<BasicContext>,
        definable: HashSet<SymbolId>,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture { ctx: Rc::new(BasicContext::new(Arena::new())), definable: HashSet::default() }
        }

        fn indeterminate(&mut self) -> Term {
            let variable = self.ctx.declare();
            self.definable.insert(variable.as_declaration().unwrap());
            variable
        }

        fn step(&mut self, equation: &Equation) -> Step {
            Solver::new(&mut self.definable).step(equation)
        }
    }

    #[test]
    fn definition_extraction_installs_a_rule() {
        let mut fx = Fixture::new();
        let arena = fx.ctx.arena.clone();
        let succ = arena.axiom();
        let hole = fx.indeterminate();
        let stack = Stack::empty(fx.ctx.clone()).extend(arena.axiom());

        // hole $0 =?= succ $0
        let lhs = arena.apply(hole.clone(), arena.argument(0));
        let rhs = arena.apply(succ.clone(), arena.argument(0));
        let equation = Equation::new(stack.clone(), lhs.clone(), rhs.clone());
        assert!(matches!(fx.step(&equation), Step::Solved));
        assert!(!fx.definable.contains(&hole.as_declaration().unwrap()));
        assert_eq!(stack.reduce(lhs), rhs);
    }

    #[test]
    fn extraction_is_skipped_without_deduction() {
        let mut fx = Fixture::new();
        let arena = fx.ctx.arena.clone();
        let hole = fx.indeterminate();
        let stack = Stack::empty(fx.ctx.clone());
        let step = fx.step(&Equation::check(stack, hole.clone(), arena.axiom()));
        assert!(matches!(step, Step::Stalled));
        assert!(!fx.ctx.has_rule(hole.as_declaration().unwrap()));
    }

    #[test]
    fn occurs_check_blocks_extraction() {
        let mut fx = Fixture::new();
        let arena = fx.ctx.arena.clone();
        let succ = arena.axiom();
        let hole = fx.indeterminate();
        let stack = Stack::empty(fx.ctx.clone());
        let step = fx.step(&Equation::new(stack, hole.clone(), arena.apply(succ, hole)));
        assert!(matches!(step, Step::Stalled));
    }

    #[test]
    fn symmetric_explosion_pairs_arguments() {
        let mut fx = Fixture::new();
        let arena = fx.ctx.arena.clone();
        let pair = arena.axiom();
        let (a, b, c) = (arena.axiom(), arena.axiom(), arena.axiom());
        let stack = Stack::empty(fx.ctx.clone());
        let lhs = arena.apply_all(pair.clone(), [a.clone(), b.clone()]);
        let rhs = arena.apply_all(pair.clone(), [a.clone(), c.clone()]);
        let Step::Derived(children) = fx.step(&Equation::new(stack.clone(), lhs, rhs)) else {
            panic!("expected a decomposition");
        };
        assert_eq!(children.len(), 2);
        assert!(matches!(fx.step(&children[0]), Step::Solved));
        assert!(matches!(fx.step(&children[1]), Step::Failed));

        let short = arena.apply(pair.clone(), a);
        assert!(matches!(fx.step(&Equation::new(stack, short, pair)), Step::Failed));
    }

    #[test]
    fn deepening_applies_a_fresh_argument() {
        let mut fx = Fixture::new();
        let ctx = fx.ctx.clone();
        let arena = &ctx.arena;
        let p = &ctx.primitives;
        let nat = arena.axiom();
        // constant Type nat Type is a family still waiting for its argument
        let family = p.constant_family(arena, nat.clone(), p.typ.clone());
        let stack = Stack::empty(ctx.clone());
        let Step::Derived(children) = fx.step(&Equation::new(stack, family.clone(), family)) else {
            panic!("expected deepening");
        };
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].stack.depth(), 1);
        assert!(matches!(fx.step(&children[0]), Step::Solved));
    }

    #[test]
    fn asymmetric_explosion_defines_the_head() {
        let mut fx = Fixture::new();
        let arena = fx.ctx.arena.clone();
        let succ = arena.axiom();
        let hole = fx.indeterminate();
        let stack = Stack::empty(fx.ctx.clone()).extend(arena.axiom()).extend(arena.axiom());

        // hole $0 =?= succ $1 cannot be solved by extraction, $1 is foreign
        let lhs = arena.apply(hole.clone(), arena.argument(0));
        let rhs = arena.apply(succ.clone(), arena.argument(1));
        let equation = Equation::new(stack.clone(), lhs.clone(), rhs);
        let Step::Derived(children) = fx.step(&equation) else {
            panic!("expected an explosion");
        };
        assert_eq!(stack.reduce(lhs).head(), &succ);
        assert_eq!(children.len(), 1);
        assert!(matches!(fx.step(&children[0]), Step::Failed));
    }

    #[test]
    fn argument_heads_map_to_their_slot() {
        let mut fx = Fixture::new();
        let arena = fx.ctx.arena.clone();
        let hole = fx.indeterminate();
        let t = arena.axiom();
        let stack = Stack::empty(fx.ctx.clone()).extend(arena.axiom()).extend(arena.axiom());

        // hole $1 =?= $1 t becomes hole := $0 (h' $0), the head read through slot 0
        let lhs = arena.apply(hole, arena.argument(1));
        let rhs = arena.apply(arena.argument(1), t.clone());
        let equation = Equation::new(stack.clone(), lhs.clone(), rhs.clone());
        let mut solver = Solver::new(&mut fx.definable);
        let Some(Step::Derived(children)) = solver.explode_asymmetric(&equation, &lhs, &rhs) else {
            panic!("expected an explosion");
        };
        assert_eq!(stack.reduce(lhs.clone()).head(), &arena.argument(1));
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].rhs, t);

        assert!(matches!(fx.step(&children[0]), Step::Solved));
        assert_eq!(stack.reduce(lhs), rhs);
    }

    #[test]
    fn data_leaves_are_rigid() {
        let mut fx = Fixture::new();
        let arena = fx.ctx.arena.clone();
        let pair = arena.axiom();
        let one = arena.data(DataLeaf::Integer(1));
        let two = arena.data(DataLeaf::Integer(2));
        let stack = Stack::empty(fx.ctx.clone());

        let lhs = arena.apply(pair.clone(), one.clone());
        let equation = Equation::new(stack.clone(), lhs.clone(), lhs);
        let Step::Derived(children) = fx.step(&equation) else {
            panic!("expected a decomposition");
        };
        assert!(matches!(fx.step(&children[0]), Step::Solved));

        let mismatched =
            Equation::new(stack, arena.apply(pair.clone(), one), arena.apply(pair, two));
        let Step::Derived(children) = fx.step(&mismatched) else {
            panic!("expected a decomposition");
        };
        assert!(matches!(fx.step(&children[0]), Step::Failed));
    }

    #[test]
    fn holes_can_be_defined_as_data() {
        let mut fx = Fixture::new();
        let arena = fx.ctx.arena.clone();
        let hole = fx.indeterminate();
        let five = arena.data(DataLeaf::Text("five".into()));
        let stack = Stack::empty(fx.ctx.clone());
        let equation = Equation::new(stack.clone(), five.clone(), hole.clone());
        assert!(matches!(fx.step(&equation), Step::Solved));
        assert_eq!(stack.reduce(hole), five);
    }

    #[test]
    fn foreign_argument_heads_fail() {
        let mut fx = Fixture::new();
        let arena = fx.ctx.arena.clone();
        let hole = fx.indeterminate();
        let stack = Stack::empty(fx.ctx.clone()).extend(arena.axiom()).extend(arena.axiom());
        let lhs = arena.apply(hole, arena.argument(0));
        let rhs = arena.apply(arena.argument(1), arena.axiom());
        assert!(matches!(fx.step(&Equation::new(stack, lhs, rhs)), Step::Failed));
    }

    #[test]
    fn inconsistent_assumptions_solve_everything() {
        let mut fx = Fixture::new();
        let arena = fx.ctx.arena.clone();
        let stack = Stack::empty(fx.ctx.clone()).extend_by_assumption(arena.axiom(), arena.axiom());
        let step = fx.step(&Equation::new(stack, arena.axiom(), arena.axiom()));
        assert!(matches!(step, Step::Solved));
    }

    #[test]
    fn undecided_equations_stall() {
        let mut fx = Fixture::new();
        let arena = fx.ctx.arena.clone();
        let opaque = fx.ctx.declare();
        let stack = Stack::empty(fx.ctx.clone());
        assert!(matches!(fx.step(&Equation::new(stack, opaque, arena.axiom())), Step::Stalled));
    }
}
