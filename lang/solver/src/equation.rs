use derivative::Derivative;
use pretty::DocAllocator;

use kiln_lang_printer::theme::ThemeExt;
use kiln_lang_printer::tokens::*;
use kiln_lang_printer::{Alloc, Builder, PrintCfg, PrintInCtx};
use kiln_lang_term::{Names, Term};

use crate::Stack;

/// The question whether `lhs` and `rhs` are definitionally equal below `stack`.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct Equation {
    pub lhs: Term,
    pub rhs: Term,
    #[derivative(Debug = "ignore")]
    pub stack: Stack,
    /// Whether solving may define indeterminates.
    pub deduce: bool,
}

impl Equation {
    pub fn new(stack: Stack, lhs: Term, rhs: Term) -> Self {
        Equation { lhs, rhs, stack, deduce: true }
    }

    /// An equation that may only be checked, never solved by definitions.
    pub fn check(stack: Stack, lhs: Term, rhs: Term) -> Self {
        Equation { lhs, rhs, stack, deduce: false }
    }

    /// A derived equation below the same telescope and with the same mode.
    pub fn derive(&self, lhs: Term, rhs: Term) -> Self {
        Equation { lhs, rhs, stack: self.stack.clone(), deduce: self.deduce }
    }
}

impl<'a> PrintInCtx<'a> for Equation {
    type Ctx = Names;

    fn print_in_ctx(&'a self, cfg: &PrintCfg, ctx: &'a Names, alloc: &'a Alloc<'a>) -> Builder<'a> {
        self.lhs
            .print_in_ctx(cfg, ctx, alloc)
            .append(alloc.space())
            .append(alloc.keyword(UNIFIES))
            .append(alloc.line().append(self.rhs.print_in_ctx(cfg, ctx, alloc)).nest(cfg.indent))
            .group()
    }
}
