use pretty::DocAllocator;

use kiln_lang_printer::theme::ThemeExt;
use kiln_lang_printer::tokens::*;
use kiln_lang_printer::{Alloc, Builder, PREC_ARG, Precedence, Print, PrintCfg, PrintInCtx};

use crate::{DataLeaf, Names, SymbolId, Term, TermKind};

fn print_symbol<'a>(
    id: SymbolId,
    names: Option<&'a Names>,
    fallback: &str,
    cfg: &PrintCfg,
) -> String {
    match names.and_then(|names| names.get(id)) {
        Some(name) if cfg.show_ids => format!("{name}{AT}{id}"),
        Some(name) => name.to_owned(),
        None => format!("{fallback}{id}"),
    }
}

fn print_atom<'a>(
    term: &'a Term,
    names: Option<&'a Names>,
    cfg: &PrintCfg,
    alloc: &'a Alloc<'a>,
) -> Builder<'a> {
    match term.kind() {
        TermKind::Argument(index) => alloc.typ(format!("{DOLLAR}{index}")),
        TermKind::Axiom(id) => alloc.ctor(print_symbol(*id, names, "ax", cfg)),
        TermKind::Declaration(id) => alloc.dtor(print_symbol(*id, names, "d", cfg)),
        TermKind::Data(DataLeaf::Integer(n)) => alloc.text(n.to_string()),
        TermKind::Data(DataLeaf::Text(s)) => alloc.text(format!("{s:?}")),
        TermKind::Conglomerate(index) => alloc.comment(format!("{HASH}{index}")),
        TermKind::Apply(..) => print_term(term, names, cfg, alloc, PREC_ARG),
    }
}

fn print_term<'a>(
    term: &'a Term,
    names: Option<&'a Names>,
    cfg: &PrintCfg,
    alloc: &'a Alloc<'a>,
    prec: Precedence,
) -> Builder<'a> {
    let mut spine = Vec::new();
    let mut head = term;
    while let TermKind::Apply(lhs, rhs) = head.kind() {
        spine.push(rhs);
        head = lhs;
    }
    if spine.is_empty() {
        return print_atom(head, names, cfg, alloc);
    }
    let args = spine.into_iter().rev().map(|arg| match arg.kind() {
        TermKind::Apply(..) => print_term(arg, names, cfg, alloc, PREC_ARG),
        _ => print_atom(arg, names, cfg, alloc),
    });
    let doc = print_atom(head, names, cfg, alloc)
        .append(alloc.line().append(alloc.intersperse(args, alloc.line())).nest(cfg.indent))
        .group();
    if prec >= PREC_ARG { doc.parens() } else { doc }
}

impl<'a> Print<'a> for Term {
    fn print_prec(&'a self, cfg: &PrintCfg, alloc: &'a Alloc<'a>, prec: Precedence) -> Builder<'a> {
        print_term(self, None, cfg, alloc, prec)
    }
}

impl<'a> PrintInCtx<'a> for Term {
    type Ctx = Names;

    fn print_in_ctx_prec(
        &'a self,
        cfg: &PrintCfg,
        ctx: &'a Self::Ctx,
        alloc: &'a Alloc<'a>,
        prec: Precedence,
    ) -> Builder<'a> {
        print_term(self, Some(ctx), cfg, alloc, prec)
    }
}
