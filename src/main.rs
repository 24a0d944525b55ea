use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    edition_toc::logging::init().context("init logging")?;

    let cli = edition_toc::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        edition_toc::cli::Command::Show(args) => {
            edition_toc::show::run(args).await.context("show")?;
        }
        edition_toc::cli::Command::Flatten(args) => {
            edition_toc::flatten::run(args).context("flatten")?;
        }
        edition_toc::cli::Command::Order(args) => {
            edition_toc::order::run(args).context("order")?;
        }
    }

    Ok(())
}
