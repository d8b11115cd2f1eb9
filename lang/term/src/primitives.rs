use crate::{Arena, Names, Pattern, Rule, RuleCollector, Term, TypeCollector};

/// The built-in type formers.
///
/// `arrow A B` is the dependent function type `(x : A) -> B x`, where the codomain
/// `B : A -> Type` is a type family. Families are built from the rewriting
/// declarations below:
///
/// * `type_family T := arrow T (constant Type Type T)`, the type of families over `T`
/// * `constant A a B b := a`, the family over `B` constantly `a : A`
/// * `id T x := x`
#[derive(Debug)]
pub struct Primitives {
    pub typ: Term,
    pub arrow: Term,
    pub type_family: Term,
    pub constant: Term,
    pub id: Term,
    pub arrow_codomain: Term,
    pub constant_codomain_1: Term,
    pub constant_codomain_2: Term,
    pub constant_codomain_3: Term,
    pub id_codomain: Term,
    /// `arrow Type arrow_codomain`, the type of `arrow`.
    pub arrow_type: Term,
}

impl Primitives {
    pub fn new(
        arena: &Arena,
        rules: &mut RuleCollector,
        types: &mut TypeCollector,
        names: &mut Names,
    ) -> Self {
        let typ = arena.axiom();
        let arrow = arena.axiom();
        let declare = |rules: &mut RuleCollector| {
            let declaration = arena.declaration();
            rules.register_declaration(&declaration);
            declaration
        };
        let type_family = declare(rules);
        let constant = declare(rules);
        let id = declare(rules);
        let arrow_codomain = declare(rules);
        let constant_codomain_1 = declare(rules);
        let constant_codomain_2 = declare(rules);
        let constant_codomain_3 = declare(rules);
        let id_codomain = declare(rules);

        let arg = |index| arena.argument(index);
        let arrow_of =
            |domain: Term, codomain: Term| arena.apply_all(arrow.clone(), [domain, codomain]);
        let constant_of = |codomain: Term, value: Term, domain: Term| {
            arena.apply_all(constant.clone(), [codomain, value, domain])
        };

        let mut define = |head: &Term, args: usize, replacement: Term| {
            rules.add_rule(Rule { pattern: Pattern::lambda(head.clone(), args), replacement })
        };
        define(&type_family, 1, arrow_of(arg(0), constant_of(typ.clone(), typ.clone(), arg(0))));
        define(&constant, 4, arg(1));
        define(&id, 2, arg(1));
        let family_of_arg = arena.apply(type_family.clone(), arg(0));
        define(
            &arrow_codomain,
            1,
            arrow_of(family_of_arg.clone(), constant_of(typ.clone(), typ.clone(), family_of_arg)),
        );
        define(
            &constant_codomain_1,
            1,
            arrow_of(arg(0), arena.apply(constant_codomain_2.clone(), arg(0))),
        );
        define(
            &constant_codomain_2,
            2,
            arrow_of(typ.clone(), arena.apply(constant_codomain_3.clone(), arg(0))),
        );
        define(&constant_codomain_3, 2, arrow_of(arg(1), constant_of(typ.clone(), arg(0), arg(1))));
        define(&id_codomain, 1, arrow_of(arg(0), constant_of(typ.clone(), arg(0), arg(0))));

        let arrow_type = arrow_of(typ.clone(), arrow_codomain.clone());
        // Type -> Type
        let endo = arena.apply(type_family.clone(), typ.clone());
        types.register_type(&typ, typ.clone());
        types.register_type(&arrow, arrow_type.clone());
        let family_codomain = constant_of(typ.clone(), typ.clone(), typ.clone());
        types.register_type(&type_family, arrow_of(typ.clone(), family_codomain));
        types.register_type(&constant, arrow_of(typ.clone(), constant_codomain_1.clone()));
        types.register_type(&id, arrow_of(typ.clone(), id_codomain.clone()));
        types.register_type(&arrow_codomain, endo.clone());
        types.register_type(&constant_codomain_1, endo.clone());
        types.register_type(&constant_codomain_2, arrow_of(typ.clone(), type_family.clone()));
        types.register_type(
            &constant_codomain_3,
            arrow_of(typ.clone(), constant_of(endo.clone(), endo.clone(), typ.clone())),
        );
        types.register_type(&id_codomain, endo);

        for (term, name) in [
            (&typ, "Type"),
            (&arrow, "arrow"),
            (&type_family, "type_family"),
            (&constant, "constant"),
            (&id, "id"),
            (&arrow_codomain, "arrow_codomain"),
            (&constant_codomain_1, "constant_codomain_1"),
            (&constant_codomain_2, "constant_codomain_2"),
            (&constant_codomain_3, "constant_codomain_3"),
            (&id_codomain, "id_codomain"),
        ] {
            names.insert(term, name);
        }

        Primitives {
            typ,
            arrow,
            type_family,
            constant,
            id,
            arrow_codomain,
            constant_codomain_1,
            constant_codomain_2,
            constant_codomain_3,
            id_codomain,
            arrow_type,
        }
    }

    /// `arrow domain codomain`
    pub fn arrow_of(&self, arena: &Arena, domain: Term, codomain: Term) -> Term {
        arena.apply_all(self.arrow.clone(), [domain, codomain])
    }

    /// `type_family ty`
    pub fn type_family_of(&self, arena: &Arena, ty: Term) -> Term {
        arena.apply(self.type_family.clone(), ty)
    }

    /// The non-dependent family over `domain` with value `codomain`.
    pub fn constant_family(&self, arena: &Arena, codomain: Term, domain: Term) -> Term {
        arena.apply_all(self.constant.clone(), [self.typ.clone(), codomain, domain])
    }

    /// `domain -> codomain`
    pub fn function_type(&self, arena: &Arena, domain: Term, codomain: Term) -> Term {
        let family = self.constant_family(arena, codomain, domain.clone());
        self.arrow_of(arena, domain, family)
    }

    /// Splits `arrow domain codomain` into its parts.
    pub fn as_arrow(&self, term: &Term) -> Option<(Term, Term)> {
        let unfolded = term.unfold();
        if unfolded.head == self.arrow && unfolded.args.len() == 2 {
            let mut args = unfolded.args.into_iter();
            Some((args.next()?, args.next()?))
        } else {
            None
        }
    }
}
