use std::borrow::Cow;

use pretty::{
    DocAllocator,
    termcolor::{Color, ColorSpec},
};

use super::types::*;

const KEYWORD: Color = Color::Magenta;
const CTOR: Color = Color::Blue;
const DTOR: Color = Color::Green;
const TYPE: Color = Color::Red;
const COMMENT: Color = Color::Cyan;
const ERROR: Color = Color::Red;

/// Colors used for the different kinds of symbols.
///
/// Axioms print as constructors, declarations as destructors (they may rewrite),
/// bound arguments as types and conglomerates as comments.
pub trait ThemeExt<'a> {
    fn keyword<U: Into<Cow<'a, str>>>(&'a self, text: U) -> Builder<'a>;
    fn ctor<U: Into<Cow<'a, str>>>(&'a self, text: U) -> Builder<'a>;
    fn dtor<U: Into<Cow<'a, str>>>(&'a self, text: U) -> Builder<'a>;
    fn typ<U: Into<Cow<'a, str>>>(&'a self, text: U) -> Builder<'a>;
    fn comment<U: Into<Cow<'a, str>>>(&'a self, text: U) -> Builder<'a>;
    fn error<U: Into<Cow<'a, str>>>(&'a self, text: U) -> Builder<'a>;
}

impl<'a> ThemeExt<'a> for Alloc<'a> {
    fn keyword<U: Into<Cow<'a, str>>>(&'a self, text: U) -> Builder<'a> {
        self.text(text).annotate(KEYWORD.spec())
    }

    fn ctor<U: Into<Cow<'a, str>>>(&'a self, text: U) -> Builder<'a> {
        self.text(text).annotate(CTOR.spec())
    }

    fn dtor<U: Into<Cow<'a, str>>>(&'a self, text: U) -> Builder<'a> {
        self.text(text).annotate(DTOR.spec())
    }

    fn typ<U: Into<Cow<'a, str>>>(&'a self, text: U) -> Builder<'a> {
        self.text(text).annotate(TYPE.spec())
    }

    fn comment<U: Into<Cow<'a, str>>>(&'a self, text: U) -> Builder<'a> {
        self.text(text).annotate(COMMENT.spec())
    }

    fn error<U: Into<Cow<'a, str>>>(&'a self, text: U) -> Builder<'a> {
        self.text(text).annotate(ERROR.spec().set_bold(true).clone())
    }
}

pub trait ColorExt {
    fn spec(self) -> ColorSpec;
}

impl ColorExt for Color {
    fn spec(self) -> ColorSpec {
        ColorSpec::new().set_fg(Some(self)).clone()
    }
}
