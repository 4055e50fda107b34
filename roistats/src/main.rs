use clap::Parser;
use env_logger::Env;
use roistats::Cli;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let mut cmd: Cli = Cli::parse();
    cmd.run_program()
}
