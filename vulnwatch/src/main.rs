use std::process::{ExitCode, Termination};

use clap::Parser;

mod clear;
mod collect;
mod critical;
mod search;
mod stats;
mod trends;

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    Collect(collect::Run),
    Stats(stats::Run),
    Search(search::Run),
    Critical(critical::Run),
    Trends(trends::Run),
    Clear(clear::Run),
}

#[derive(clap::Parser, Debug)]
#[command(
    author,
    version = env!("CARGO_PKG_VERSION"),
    about = "Vulnerability collection and reporting",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

impl Cli {
    async fn run(self) -> ExitCode {
        match self.run_command().await {
            Ok(code) => code,
            Err(err) => {
                eprintln!("Error: {err}");
                for (n, err) in err.chain().skip(1).enumerate() {
                    if n == 0 {
                        eprintln!("Caused by:");
                    }
                    eprintln!("\t{err}");
                }

                ExitCode::FAILURE
            }
        }
    }

    async fn run_command(self) -> anyhow::Result<ExitCode> {
        match self.command {
            Command::Collect(run) => run.run().await,
            Command::Stats(run) => run.run().await,
            Command::Search(run) => run.run().await,
            Command::Critical(run) => run.run().await,
            Command::Trends(run) => run.run().await,
            Command::Clear(run) => run.run().await,
        }
    }
}

#[tokio::main]
async fn main() -> impl Termination {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    Cli::parse().run().await
}
