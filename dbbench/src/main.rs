//! The `dbbench` command line tool.
#![warn(missing_debug_implementations)]

mod cli;

fn main() -> anyhow::Result<()> {
    cli::execute()
}
