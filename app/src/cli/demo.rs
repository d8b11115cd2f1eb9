use std::rc::Rc;

use miette::Diagnostic;
use thiserror::Error;

use kiln_lang_term::{Arena, BasicContext};

use crate::demos::{self, DEMOS, Host};
use crate::global_settings::GlobalSettings;

use super::terminal;

#[derive(clap::Args)]
pub struct Args {
    /// Name of the demo to elaborate
    #[clap(value_name = "NAME", required_unless_present = "list")]
    name: Option<String>,
    /// List the bundled demos
    #[clap(long)]
    list: bool,
}

pub fn exec(cmd: Args, settings: &GlobalSettings) -> miette::Result<()> {
    if cmd.list {
        for demo in DEMOS {
            println!("{:<16}{}", demo.name, demo.description);
        }
        return Ok(());
    }
    let name = cmd.name.unwrap_or_default();
    let Some(demo) = demos::find(&name) else {
        return Err(UnknownDemo { name }.into());
    };

    let host = Host::new(Rc::new(BasicContext::new(Arena::new())));
    let program = demo.build(&host);
    let value = host.session.elaborate(&program);
    let errors = host.session.finish();
    {
        let names = host.ctx.names.borrow();
        terminal::print_labelled("value", &host.session.reduce(value.value), &names, settings)?;
        terminal::print_labelled("type", &host.session.reduce(value.ty), &names, settings)?;
    }

    if errors.is_empty() {
        return Ok(());
    }
    let count = errors.len();
    for error in errors {
        eprintln!("{:?}", miette::Report::new(error));
    }
    Err(ElaborationFailed { count }.into())
}

#[derive(Error, Diagnostic, Debug)]
#[error("There is no demo called \"{name}\"")]
#[diagnostic(help("Run `kiln demo --list` to see the bundled demos."))]
pub struct UnknownDemo {
    name: String,
}

#[derive(Error, Diagnostic, Debug)]
#[error("Elaboration finished with {count} error(s)")]
pub struct ElaborationFailed {
    count: usize,
}
