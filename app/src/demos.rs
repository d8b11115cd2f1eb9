//! The programs bundled with the binary.
//!
//! Every demo starts from a fresh context in which `nat : Type` is embedded at
//! index 0.

use std::rc::Rc;

use kiln_lang_elaborator::{Builder, Program, Session};
use kiln_lang_term::{BasicContext, Pattern, Rule, Term, TypedValue};

pub struct Demo {
    pub name: &'static str,
    pub description: &'static str,
    build: fn(&Host) -> Program,
}

impl Demo {
    pub fn build(&self, host: &Host) -> Program {
        (self.build)(host)
    }
}

pub const DEMOS: &[Demo] = &[
    Demo { name: "axiom", description: "an embedded axiom elaborates to itself", build: axiom },
    Demo { name: "arrow", description: "the arrow primitive applied to a type", build: arrow },
    Demo { name: "declaration", description: "a declaration of type nat", build: declaration },
    Demo { name: "hole", description: "a hole deduced from a dependent argument", build: hole },
    Demo {
        name: "not-a-function",
        description: "applying nat to itself fails",
        build: not_a_function,
    },
    Demo { name: "pred", description: "defining pred by the rule pred (succ n) = n", build: pred },
];

pub fn find(name: &str) -> Option<&'static Demo> {
    DEMOS.iter().find(|demo| demo.name == name)
}

pub struct Host {
    pub ctx: Rc<BasicContext>,
    pub session: Rc<Session>,
    pub nat: Term,
}

impl Host {
    pub fn new(ctx: Rc<BasicContext>) -> Self {
        let session = Session::new(ctx.clone());
        let (nat, _) = session.declare_axiom("nat", ctx.primitives.typ.clone());
        Host { ctx, session, nat }
    }

    fn function_type(&self, domain: Term, codomain: Term) -> Term {
        self.ctx.primitives.function_type(&self.ctx.arena, domain, codomain)
    }

    fn embed_type(&self, ty: Term) -> usize {
        self.session.embed_value(TypedValue::new(ty, self.ctx.primitives.typ.clone()))
    }
}

fn axiom(_: &Host) -> Program {
    let b = Builder::new();
    Program { commands: vec![], value: b.embed(0) }
}

fn arrow(_: &Host) -> Program {
    let b = Builder::new();
    Program { commands: vec![], value: b.apply(b.arrow(), b.embed(0)) }
}

fn declaration(_: &Host) -> Program {
    let b = Builder::new();
    Program { commands: vec![b.declare(b.embed(0))], value: b.local(0) }
}

fn hole(host: &Host) -> Program {
    let ctx = &host.ctx;
    let arena = &ctx.arena;
    let p = &ctx.primitives;
    let (zero, _) = host.session.declare_axiom("zero", host.nat.clone());
    let nonneg = arena.axiom();
    ctx.register_type(&nonneg, p.type_family_of(arena, host.nat.clone()));
    ctx.name(&nonneg, "Nonneg");
    let codomain = ctx.declare();
    ctx.add_rule(Rule {
        pattern: Pattern::lambda(codomain.clone(), 1),
        replacement: host
            .function_type(arena.apply(nonneg.clone(), arena.argument(0)), host.nat.clone()),
    });
    let (_, f) = host.session.declare_axiom("f", p.arrow_of(arena, host.nat.clone(), codomain));
    let (_, x) = host.session.declare_axiom("x", arena.apply(nonneg, zero));

    let b = Builder::new();
    Program {
        commands: vec![b.declare_hole(b.embed(0))],
        value: b.apply(b.apply(b.embed(f), b.local(0)), b.embed(x)),
    }
}

fn not_a_function(_: &Host) -> Program {
    let b = Builder::new();
    Program { commands: vec![], value: b.apply(b.embed(0), b.embed(0)) }
}

fn pred(host: &Host) -> Program {
    let (_, zero) = host.session.declare_axiom("zero", host.nat.clone());
    let endo_type = host.function_type(host.nat.clone(), host.nat.clone());
    let (_, succ) = host.session.declare_axiom("succ", endo_type.clone());
    let endo = host.embed_type(endo_type);

    let b = Builder::new();
    let pattern = b.pat_apply(b.pat_local(0), b.pat_apply(b.pat_embed(succ), b.capture(0)));
    Program {
        commands: vec![b.declare(b.embed(endo)), b.rule(pattern, vec![], 1, vec![], b.local(1))],
        value: b.apply(b.local(0), b.apply(b.embed(succ), b.embed(zero))),
    }
}
