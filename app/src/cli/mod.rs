use clap::{Parser, Subcommand};

use crate::global_settings::GlobalSettings;

mod demo;
mod terminal;

pub fn exec() -> miette::Result<()> {
    use Command::*;
    let cli = Cli::parse();
    let settings = GlobalSettings::from_env();
    env_logger::Builder::new().filter_level(settings.log_level).format_timestamp(None).init();
    match cli.command {
        Demo(args) => demo::exec(args, &settings),
    }
}

#[derive(Parser)]
#[clap(version, author, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Elaborate one of the bundled programs
    Demo(demo::Args),
}
