use std::rc::Rc;

use kiln_lang_elaborator::{Builder, ElabError, Program, Session};
use kiln_lang_term::{Arena, BasicContext, Pattern, Rule, Term, TypedValue};

/// A session over a fresh context with `nat : Type` embedded at index 0.
struct Host {
    ctx: Rc<BasicContext>,
    session: Rc<Session>,
    nat: Term,
}

impl Host {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let ctx = Rc::new(BasicContext::new(Arena::new()));
        let session = Session::new(ctx.clone());
        let (nat, index) = session.declare_axiom("nat", ctx.primitives.typ.clone());
        assert_eq!(index, 0);
        Host { ctx, session, nat }
    }

    fn arrow(&self, domain: Term, codomain: Term) -> Term {
        self.ctx.primitives.function_type(&self.ctx.arena, domain, codomain)
    }

    /// `nat -> nat`
    fn endo(&self) -> Term {
        self.arrow(self.nat.clone(), self.nat.clone())
    }

    fn embed_type(&self, ty: Term) -> usize {
        self.session.embed_value(TypedValue::new(ty, self.ctx.primitives.typ.clone()))
    }
}

#[test]
fn embedded_axiom_elaborates_to_itself() {
    let host = Host::new();
    let b = Builder::new();
    let value = host.session.elaborate(&Program { commands: vec![], value: b.embed(0) });

    assert_eq!(value.value, host.nat);
    assert_eq!(value.ty, host.ctx.primitives.typ);
    assert!(host.session.solved());
    assert!(host.session.finish().is_empty());
}

#[test]
fn arrow_applied_to_a_type() {
    let host = Host::new();
    let p = &host.ctx.primitives;
    let arena = &host.ctx.arena;
    let b = Builder::new();
    let program = Program { commands: vec![], value: b.apply(b.arrow(), b.embed(0)) };
    let value = host.session.elaborate(&program);

    assert_eq!(value.value, arena.apply(p.arrow.clone(), host.nat.clone()));
    assert_eq!(
        host.session.reduce(value.ty),
        host.session.reduce(arena.apply(p.arrow_codomain.clone(), host.nat.clone()))
    );
    assert!(host.session.solved());
}

#[test]
fn declaration_has_the_declared_type() {
    let host = Host::new();
    let b = Builder::new();
    let program = Program { commands: vec![b.declare(b.embed(0))], value: b.local(0) };
    let value = host.session.elaborate(&program);

    assert!(value.value.as_declaration().is_some());
    let registered = host.ctx.type_of_symbol(&value.value).unwrap();
    assert_eq!(host.session.reduce(registered), host.nat);
    assert_eq!(value.ty, host.nat);
    assert!(host.session.solved());
}

#[test]
fn hole_is_deduced_through_a_dependent_argument() {
    let host = Host::new();
    let ctx = &host.ctx;
    let arena = &ctx.arena;
    let p = &ctx.primitives;
    let session = &host.session;

    let (zero, _) = session.declare_axiom("zero", host.nat.clone());
    let nonneg = arena.axiom();
    ctx.register_type(&nonneg, p.type_family_of(arena, host.nat.clone()));
    ctx.name(&nonneg, "Nonneg");
    // f : (n : nat) -> Nonneg n -> nat
    let codomain = ctx.declare();
    ctx.add_rule(Rule {
        pattern: Pattern::lambda(codomain.clone(), 1),
        replacement: host.arrow(arena.apply(nonneg.clone(), arena.argument(0)), host.nat.clone()),
    });
    let (f, f_index) = session.declare_axiom("f", p.arrow_of(arena, host.nat.clone(), codomain));
    let (x, x_index) = session.declare_axiom("x", arena.apply(nonneg, zero.clone()));

    let b = Builder::new();
    let program = Program {
        commands: vec![b.declare_hole(b.embed(0))],
        value: b.apply(b.apply(b.embed(f_index), b.local(0)), b.embed(x_index)),
    };
    let value = session.elaborate(&program);

    assert!(session.solved(), "{:?}", session.errors());
    assert_eq!(session.reduce(value.value.clone()), arena.apply_all(f, [zero.clone(), x]));
    let hole = value.value.unfold().args[0].head().clone();
    assert_eq!(session.reduce(hole), zero);
}

#[test]
fn applying_a_non_function_fails_without_leaking() {
    let host = Host::new();
    let arena = host.ctx.arena.clone();
    let b = Builder::new();
    let program = Program { commands: vec![], value: b.apply(b.embed(0), b.embed(0)) };
    let value = host.session.elaborate(&program);

    assert!(!host.session.solved());
    let errors = host.session.finish();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ElabError::NotAFunction { .. }));
    assert!(!errors[0].is_soft());

    let Host { ctx, session, nat } = host;
    drop((value, nat, session, ctx));
    assert_eq!(arena.live_terms(), 0);
}

#[test]
fn type_families_are_formed_over_types() {
    let host = Host::new();
    let p = &host.ctx.primitives;
    let b = Builder::new();
    let program = Program { commands: vec![], value: b.type_family_over(b.embed(0)) };
    let value = host.session.elaborate(&program);

    assert_eq!(value.value, p.type_family_of(&host.ctx.arena, host.nat.clone()));
    assert_eq!(value.ty, p.typ);
    assert!(host.session.solved());
}

#[test]
fn type_families_over_values_are_rejected() {
    let host = Host::new();
    let (_, zero_index) = host.session.declare_axiom("zero", host.nat.clone());
    let b = Builder::new();
    let family = b.type_family_over(b.embed(zero_index));
    let family_id = family.id();
    host.session.elaborate(&Program { commands: vec![], value: family });

    let errors = host.session.finish();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ElabError::BadTypeFamilyType { .. }));
    assert_eq!(errors[0].node(), family_id);
}

/// `pred : nat -> nat` with the rule `pred (succ n) = n`.
fn pred_program(host: &Host) -> (Program, Term, Term) {
    let session = &host.session;
    let (zero, zero_index) = session.declare_axiom("zero", host.nat.clone());
    let (succ, succ_index) = session.declare_axiom("succ", host.endo());
    let endo = host.embed_type(host.endo());

    let b = Builder::new();
    let pattern = b.pat_apply(b.pat_local(0), b.pat_apply(b.pat_embed(succ_index), b.capture(0)));
    let program = Program {
        commands: vec![b.declare(b.embed(endo)), b.rule(pattern, vec![], 1, vec![], b.local(1))],
        value: b.apply(b.local(0), b.apply(b.embed(succ_index), b.embed(zero_index))),
    };
    (program, zero, succ)
}

#[test]
fn rule_is_committed_once_its_type_checks() {
    let host = Host::new();
    let (program, zero, _) = pred_program(&host);
    let value = host.session.elaborate(&program);

    assert!(host.session.solved(), "{:?}", host.session.errors());
    assert_eq!(host.session.reduce(value.value.clone()), zero);
    let pred = value.value.unfold().head;
    assert!(host.ctx.has_rule(pred.as_declaration().unwrap()));
}

#[test]
fn committing_a_rule_leaks_nothing() {
    let host = Host::new();
    let arena = host.ctx.arena.clone();
    let (program, zero, succ) = pred_program(&host);
    let value = host.session.elaborate(&program);
    assert!(host.session.solved(), "{:?}", host.session.errors());
    assert!(host.session.finish().is_empty());

    let Host { ctx, session, nat } = host;
    drop((value, zero, succ, nat, session, ctx));
    assert_eq!(arena.live_terms(), 0);
}

#[test]
fn committed_rules_survive_into_later_programs() {
    let host = Host::new();
    let (program, zero, succ) = pred_program(&host);
    let first = host.session.elaborate(&program);
    let pred = first.value.unfold().head;
    let arena = &host.ctx.arena;

    let two = arena.apply(succ.clone(), arena.apply(succ, zero.clone()));
    let nested = arena.apply(pred.clone(), two);
    assert_eq!(host.session.reduce(arena.apply(pred, nested)), zero);
}

#[test]
fn replacement_of_the_wrong_type_is_rejected() {
    let host = Host::new();
    let session = &host.session;
    let (_, succ_index) = session.declare_axiom("succ", host.endo());
    let endo = host.embed_type(host.endo());

    let b = Builder::new();
    let pattern = b.pat_apply(b.pat_local(0), b.pat_apply(b.pat_embed(succ_index), b.capture(0)));
    // pred (succ n) = nat, which is a type rather than a number.
    let rule = b.rule(pattern, vec![], 1, vec![], b.embed(0));
    let rule_id = rule.id();
    let program = Program { commands: vec![b.declare(b.embed(endo)), rule], value: b.local(0) };
    let value = session.elaborate(&program);

    assert!(!session.solved());
    let errors = session.finish();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ElabError::MismatchedReplacementType { .. }));
    assert_eq!(errors[0].node(), rule_id);
    assert!(!host.ctx.has_rule(value.value.as_declaration().unwrap()));
}

#[test]
fn failed_requirement_names_the_check() {
    let host = Host::new();
    let session = &host.session;
    let (_, zero_index) = session.declare_axiom("zero", host.nat.clone());
    let (_, one_index) = session.declare_axiom("one", host.nat.clone());

    let b = Builder::new();
    let check = b.check(b.embed(zero_index), Some(b.embed(0)), Some(b.embed(one_index)), true);
    let check_id = check.id();
    session.elaborate(&Program { commands: vec![check], value: b.embed(0) });

    let errors = session.finish();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ElabError::FailedRequirement { node, trace } => {
            assert_eq!(*node, check_id);
            assert!(!trace.stalled);
            assert!(trace.lines[0].contains("zero"));
            assert!(trace.lines[0].contains("one"));
        }
        error => panic!("unexpected error {error:?}"),
    }
}

#[test]
fn undecided_check_is_a_soft_failure() {
    let host = Host::new();
    let b = Builder::new();
    let commands = vec![
        b.declare_hole(b.embed(0)),
        b.declare_hole(b.embed(0)),
        b.check(b.local(0), None, Some(b.local(1)), false),
    ];
    host.session.elaborate(&Program { commands, value: b.local(0) });

    assert!(host.session.errors().is_empty());
    assert!(!host.session.solved());
    let errors = host.session.finish();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ElabError::FailedRequirement { .. }));
    assert!(errors[0].is_soft());
}

#[test]
fn holes_cannot_be_given_rules() {
    let host = Host::new();
    let (_, succ_index) = host.session.declare_axiom("succ", host.endo());
    let endo = host.embed_type(host.endo());

    let b = Builder::new();
    let pattern = b.pat_apply(b.pat_local(0), b.pat_apply(b.pat_embed(succ_index), b.capture(0)));
    let rule = b.rule(pattern, vec![], 1, vec![], b.local(1));
    let rule_id = rule.id();
    let commands = vec![b.declare_hole(b.embed(endo)), rule];
    let program = Program { commands, value: b.embed(0) };
    host.session.elaborate(&program);

    let errors = host.session.finish();
    assert!(errors.contains(&ElabError::InvalidRuleHead { node: rule_id }));
}

#[test]
fn pattern_errors_do_not_stop_elaboration() {
    let host = Host::new();
    let (zero, zero_index) = host.session.declare_axiom("zero", host.nat.clone());
    let endo = host.embed_type(host.endo());

    let b = Builder::new();
    // Capture 1 is declared but never bound.
    let pattern = b.pat_apply(b.pat_local(0), b.capture(0));
    let rule = b.rule(pattern, vec![], 2, vec![], b.local(1));
    let rule_id = rule.id();
    let program = Program {
        commands: vec![b.declare(b.embed(endo)), rule],
        value: b.embed(zero_index),
    };
    let value = host.session.elaborate(&program);

    assert_eq!(value.value, zero);
    let expected = ElabError::MissingCaptureInRule { node: rule_id, capture: 1 };
    assert_eq!(host.session.errors(), vec![expected]);
}

#[test]
fn for_all_binds_an_argument_of_the_bound_type() {
    let host = Host::new();
    let (zero, zero_index) = host.session.declare_axiom("zero", host.nat.clone());
    let (_, succ_index) = host.session.declare_axiom("succ", host.endo());

    let b = Builder::new();
    // for all n : nat, let m = succ n; check m : nat
    let body = vec![
        b.let_(b.apply(b.embed(succ_index), b.local(0)), Some(b.embed(0))),
        b.check(b.local(1), Some(b.embed(0)), None, true),
    ];
    let value = host.session.elaborate(&Program {
        commands: vec![b.for_all(b.embed(0), body)],
        value: b.embed(zero_index),
    });

    assert_eq!(value.value, zero);
    assert!(host.session.solved(), "{:?}", host.session.errors());
}
