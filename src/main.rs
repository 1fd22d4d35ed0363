use chrono::Utc;
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use flow_stakeout::config::Config;
use flow_stakeout::models::{DateRange, FlowAddress};
use flow_stakeout::pipeline::run_report;
use flow_stakeout::services::epoch_source::{list_epochs, EpochSource};
use flow_stakeout::services::flow_access::FlowAccessClient;
use flow_stakeout::services::flowscan::FlowscanClient;
use flow_stakeout::services::http_client::create_http_client;
use flow_stakeout::services::reconciliation::RewardSource;
use flow_stakeout::services::rewards_indexer::{IndexedRewardSource, RewardsIndexerClient};
use flow_stakeout::Error;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "Pass your Flow address as an argument.\n\nExample:\n\nflow-stakeout 0xe467b9dd11fa00df";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RewardBackend {
    /// Read each epoch's payout transaction from a Flow Access node
    Access,
    /// Use the rewards indexer's pre-aggregated history
    Indexer,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Sum the staking rewards paid to a Flow account's delegations")]
struct Args {
    /// Flow account address, e.g. 0xe467b9dd11fa00df
    address: Option<String>,

    /// Filter by epochs in this year (e.g. 2022); 0 means no year filter
    #[arg(long)]
    year: Option<i32>,

    /// Filter by epochs after this date (e.g. 2021-04-27)
    #[arg(long)]
    start: Option<String>,

    /// Filter by epochs before this date (e.g. 2021-04-27)
    #[arg(long)]
    end: Option<String>,

    /// Read the epoch list from a local CSV file instead of EPOCHS_CSV_URL
    #[arg(long)]
    epochs_file: Option<PathBuf>,

    /// Where reward payouts are looked up
    #[arg(long, value_enum, default_value_t = RewardBackend::Access)]
    source: RewardBackend,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Error> {
    let Some(address) = args.address.as_deref() else {
        println!("{USAGE}");
        return Ok(());
    };
    let address: FlowAddress = address.parse()?;

    let config = Config::from_env()?;
    let client = create_http_client(&config)?;

    let epoch_source = match &args.epochs_file {
        Some(path) => EpochSource::File(path.clone()),
        None => EpochSource::Remote(config.epochs_csv_url.clone()),
    };
    let epochs = list_epochs(&epoch_source, &client).await?;

    let year = args.year.filter(|&y| y != 0);
    if year.is_some() && (args.start.is_some() || args.end.is_some()) {
        warn!("--year overrides --start and --end");
    }
    let now = Utc::now();
    let first_epoch = epochs.first().map(|e| e.timestamp).unwrap_or(now);
    let range = DateRange::resolve(
        year,
        args.start.as_deref(),
        args.end.as_deref(),
        first_epoch,
        now,
    )?;

    let directory = FlowscanClient::new(
        client.clone(),
        config.flowscan_api.clone(),
        config.directory_page_size,
    );

    let rewards: Box<dyn RewardSource + Send + Sync> = match args.source {
        RewardBackend::Access => Box::new(FlowAccessClient::new(
            client.clone(),
            config.access_api.clone(),
            config.retry.clone(),
            config.max_response_bytes,
        )),
        RewardBackend::Indexer => {
            let base_url = config.rewards_indexer_api.clone().ok_or_else(|| {
                Error::config("REWARDS_INDEXER_API must be set to use --source indexer")
            })?;
            let pages = RewardsIndexerClient::new(
                client.clone(),
                base_url,
                config.retry.clone(),
                config.max_response_bytes,
            );
            Box::new(IndexedRewardSource::new(
                pages,
                address.clone(),
                config.indexer_page_size,
                config.reward_window,
            ))
        }
    };
    info!("Using {:?} reward source", args.source);

    run_report(
        &directory,
        rewards.as_ref(),
        &epochs,
        &address,
        &range,
        std::io::stdout(),
    )
    .await?;

    Ok(())
}
