use std::path::PathBuf;
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
    readinglist::logging::init().context("init logging")?;

    let cli = readinglist::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    let root = PathBuf::from(&cli.root);
    match cli.command {
        readinglist::cli::Command::Convert(args) => {
            readinglist::convert::run(&root, args).context("convert")?;
        }
        readinglist::cli::Command::Thumbnails(args) => {
            readinglist::thumbnails::run(&root, args)
                .await
                .context("thumbnails")?;
        }
    }

    Ok(())
}
