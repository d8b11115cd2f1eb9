use std::io::Write;

use kiln_lang_printer::{PrintCfg, PrintInCtxExt, StandardStream};
use kiln_lang_term::{Names, Term};
use miette::IntoDiagnostic;

use crate::global_settings::GlobalSettings;

pub fn width() -> usize {
    termsize::get().map(|size| size.cols as usize).unwrap_or(kiln_lang_printer::DEFAULT_WIDTH)
}

/// Prints `label: term` on stdout.
pub fn print_labelled(
    label: &str,
    term: &Term,
    names: &Names,
    settings: &GlobalSettings,
) -> miette::Result<()> {
    let cfg = PrintCfg { width: width(), ..Default::default() };
    let mut stream = StandardStream::stdout(settings.colorize);
    write!(stream, "{label}: ").into_diagnostic()?;
    term.print_in_ctx_colored(&cfg, names, &mut stream).into_diagnostic()?;
    writeln!(stream).into_diagnostic()
}
