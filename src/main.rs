use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use cryptoadvisor::api::{BybitClient, CandleProvider, MarketScenario, SyntheticProvider};
use cryptoadvisor::config::Settings;
use cryptoadvisor::engine::Analyzer;
use cryptoadvisor::models::{Action, AnalysisReport, Timeframe};
use cryptoadvisor::predictor::{ModelStore, TrainingStatus};
use cryptoadvisor::AdvisorError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "cryptoadvisor",
    version,
    about = "Multi-timeframe technical analysis trade advisor"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a symbol and print a recommendation
    Analyze {
        /// Symbol to analyze (e.g. BTCUSDT or BTC/USDT). Overrides settings.
        #[arg(long)]
        symbol: Option<String>,

        /// Comma-separated timeframes (e.g. 1h,4h,1d). Overrides settings.
        #[arg(long, value_delimiter = ',')]
        timeframes: Option<Vec<String>>,

        /// Settings file. Defaults to ./cryptoadvisor.toml if present.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use seeded synthetic candles instead of Bybit
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Seed for synthetic candles
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Market shape for synthetic candles
        #[arg(long, value_enum, default_value_t = MarketScenario::Uptrend)]
        scenario: MarketScenario,

        /// Train the direction model before analyzing
        #[arg(long, default_value_t = false)]
        train: bool,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Compare the local clock with Bybit server time
    CheckTime {
        /// Settings file. Defaults to ./cryptoadvisor.toml if present.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Options for one `analyze` invocation after settings are merged
struct AnalyzeRequest {
    symbol: String,
    timeframes: Vec<String>,
    train: bool,
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            symbol,
            timeframes,
            config,
            offline,
            seed,
            scenario,
            train,
            json,
        } => {
            let settings = Settings::load(config.as_deref()).context("Failed to load settings")?;
            let request = AnalyzeRequest {
                symbol: symbol.unwrap_or_else(|| settings.analysis.symbol.clone()),
                timeframes: timeframes.unwrap_or_else(|| settings.analysis.timeframes.clone()),
                train,
                json,
            };

            if offline {
                tracing::info!(seed, ?scenario, "Offline mode: using synthetic candles");
                let provider = Arc::new(SyntheticProvider::new(seed, scenario));
                run_analysis(provider, &settings, request).await
            } else {
                let provider = Arc::new(
                    BybitClient::new(settings.provider.clone())
                        .context("Failed to build Bybit client")?,
                );
                warn_on_clock_drift(&provider).await;
                run_analysis(provider, &settings, request).await
            }
        }
        Commands::CheckTime { config } => {
            let settings = Settings::load(config.as_deref()).context("Failed to load settings")?;
            let client =
                BybitClient::new(settings.provider.clone()).context("Failed to build Bybit client")?;

            match client.check_time_sync().await {
                Ok(drift) => {
                    println!("Clock in sync with Bybit (drift {:+.3}s)", drift);
                    Ok(())
                }
                Err(e @ AdvisorError::ClockDrift { .. }) => {
                    tracing::warn!(error = %e, "Clock drift detected");
                    println!("⚠️  {}", e);
                    Ok(())
                }
                Err(e) => Err(e).context("Failed to fetch Bybit server time"),
            }
        }
    }
}

async fn run_analysis<P>(provider: Arc<P>, settings: &Settings, request: AnalyzeRequest) -> Result<()>
where
    P: CandleProvider + 'static,
{
    let weights = settings.weight_config().context("Invalid weights")?;
    let options = settings.analysis_options().context("Invalid analysis settings")?;

    let store = if request.train {
        let timeframes: Vec<Timeframe> = request
            .timeframes
            .iter()
            .filter_map(|tf| tf.parse().ok())
            .collect();

        let mut symbols = settings.predictor.training_symbols.clone();
        if !symbols.iter().any(|s| s.eq_ignore_ascii_case(&request.symbol)) {
            symbols.push(request.symbol.clone());
        }

        tracing::info!(symbols = ?symbols, "Training direction models");
        ModelStore::train_from_provider(
            settings.predictor.clone(),
            Arc::clone(&provider),
            &symbols,
            &timeframes,
            Utc::now(),
        )
        .await
    } else {
        ModelStore::with_config(settings.predictor.clone())
    };

    match store.training_status(Utc::now()) {
        TrainingStatus::NeverTrained => {
            tracing::info!("Direction model untrained, ai vote omitted (use --train)");
        }
        TrainingStatus::Stale { days_since } => {
            tracing::warn!(days_since, "Direction model is stale, retrain recommended");
        }
        TrainingStatus::Fresh { next_due } => {
            tracing::debug!(%next_due, "Direction model fresh");
        }
    }

    let analyzer = Analyzer::new(provider, Arc::new(store))
        .with_indicators(settings.indicators.clone())
        .with_trade_config(settings.trade.clone())
        .with_options(options);

    let report = analyzer
        .analyze(&request.symbol, &request.timeframes, &weights)
        .await;

    if request.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        print_report(&report);
    }

    Ok(())
}

async fn warn_on_clock_drift(client: &BybitClient) {
    match client.check_time_sync().await {
        Ok(drift) => tracing::debug!(drift_secs = drift, "Clock check passed"),
        Err(e) => tracing::warn!(error = %e, "Clock check failed, candle timestamps may be off"),
    }
}

fn print_report(report: &AnalysisReport) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              CRYPTOADVISOR ANALYSIS                   ║");
    println!("╚═══════════════════════════════════════════════════════╝");
    println!("  Symbol:    {}", report.symbol);
    println!("  Run:       {}", report.run_id);
    println!("  Generated: {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));

    if report.per_timeframe.is_empty() {
        println!("\n  No timeframe produced data.");
    }

    for bundle in &report.per_timeframe {
        println!("\n  [{}]", bundle.timeframe);
        for result in bundle.iter() {
            match result.numeric_value {
                Some(value) => println!(
                    "    {:<11} {:<11} {:>12.4}",
                    result.indicator_name,
                    format!("{:?}", result.signal),
                    value
                ),
                None => println!(
                    "    {:<11} {:?}",
                    result.indicator_name, result.signal
                ),
            }
        }
    }

    let rec = &report.recommendation;
    let icon = match rec.action {
        Action::Buy => "📈",
        Action::Sell => "📉",
        Action::Hold => "⏸️ ",
    };
    println!("\n  {} {:?} (confidence {:.2}%)", icon, rec.action, rec.confidence);
    println!("     buy weight {:.2} / sell weight {:.2}", rec.buy_weight, rec.sell_weight);

    let trade = &report.trade_parameters;
    println!("\n  Entry:        {:.2}", trade.entry_price);
    println!("  Take profit:  {:.2}", trade.take_profit);
    println!("  Stop loss:    {:.2}", trade.stop_loss);
    println!("  Horizon:      {:?}", trade.horizon);
    println!("  Success est.: {:.2}%", trade.success_probability);
    println!();
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cryptoadvisor=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
