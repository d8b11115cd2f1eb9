mod cli;
mod demos;
mod global_settings;

fn main() -> miette::Result<()> {
    cli::exec()
}
