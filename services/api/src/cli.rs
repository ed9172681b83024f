use crate::demo::{run_allocate, run_demo, AllocateArgs, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use club_recruit::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Club Recruitment Service",
    about = "Run the club recruitment service or dry-run allocations from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Allocate an exported snapshot offline and print the partition
    Allocate(AllocateArgs),
    /// Walk a scripted season from draft to allocation
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Allocate(args) => run_allocate(args),
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_parses_paths_and_strategy() {
        let cli = Cli::try_parse_from([
            "club-recruit-api",
            "allocate",
            "--candidates",
            "apps.csv",
            "--capacities",
            "clubs.csv",
            "--strategy",
            "settled-window",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::Allocate(args)) => {
                assert_eq!(args.candidates.to_string_lossy(), "apps.csv");
                assert_eq!(
                    args.strategy,
                    Some(club_recruit::recruitment::AllocationStrategy::SettledWindow)
                );
            }
            other => panic!("expected allocate command, got {other:?}"),
        }
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(Cli::try_parse_from([
            "club-recruit-api",
            "demo",
            "--strategy",
            "lottery",
        ])
        .is_err());
    }
}
