use soltrack::{
    arguments,
    config::{Config, Transport},
    extractor::BrowserSource,
    fetcher::ApiSource,
    input,
    logger::{self, LogTag},
    orchestrator::{Orchestrator, RunSummary},
    persistence::CsvSink,
};
use std::path::Path;

fn print_help() {
    println!("soltrack - Solscan account balance tracker");
    println!();
    println!("Usage: soltrack [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <path>    Config file (default: config.json, created on first run)");
    println!("  --accounts <path>  Identifier list, overrides the config value");
    println!("  --debug            Show debug log lines");
    println!("  -h, --help         Show this help");
}

#[tokio::main]
async fn main() {
    if arguments::is_help_requested() {
        print_help();
        return;
    }

    logger::header("account balance run");

    match run().await {
        Ok(summary) => {
            logger::info(
                LogTag::System,
                &format!(
                    "Finished: {} accounts processed, {} rows persisted",
                    summary.processed, summary.persisted
                ),
            );
        }
        Err(e) => {
            logger::error(LogTag::System, &format!("Fatal: {:#}", e));
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<RunSummary> {
    let config_path =
        arguments::get_arg_value("--config").unwrap_or_else(|| "config.json".to_string());
    let config = Config::load(&config_path)?;

    let accounts_path =
        arguments::get_arg_value("--accounts").unwrap_or_else(|| config.accounts_file.clone());
    let accounts = input::read_accounts(Path::new(&accounts_path))?;
    if accounts.is_empty() {
        anyhow::bail!("accounts file {} contains no identifiers", accounts_path);
    }
    logger::info(
        LogTag::System,
        &format!("Loaded {} account identifiers from {}", accounts.len(), accounts_path),
    );

    let sink = CsvSink::new(&config.output_file);

    match config.transport {
        Transport::Browser => {
            let source = BrowserSource::open(&config).await?;
            let mut orchestrator = Orchestrator::new(source, sink);
            let result = orchestrator.run(&accounts).await;
            // release the browser session on every exit path
            orchestrator.into_source().close().await;
            Ok(result?)
        }
        Transport::Api => {
            let source = ApiSource::open(&config)?;
            let mut orchestrator = Orchestrator::new(source, sink);
            Ok(orchestrator.run(&accounts).await?)
        }
    }
}
