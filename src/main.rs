use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use rapitest::cli::{self, Cli, Commands};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    // 初始化日志系统
    rapitest::logger::init_logger();

    let args = Cli::parse();
    match args.command {
        Commands::Run {
            path,
            environment,
            verbose,
        } => {
            let totals = cli::run(&path, environment.as_deref(), verbose).await?;
            if totals.requests_failed > 0 || totals.tests_failed > 0 {
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { path: _ } => {
            anyhow::bail!("Checking is not implemented yet");
        }
    }
}
