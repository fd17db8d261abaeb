/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: REST query results on stdout, payment status logs with graceful shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, subcommands, startup flow, or shutdown handling
*/

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nowpayments_adapter::{NowPaymentsClient, NowPaymentsWebSocket};
use nowpayments_watch::config::API_KEY_ENV;
use nowpayments_watch::{PaymentWatcher, WatchConfig, WatchOutcome};

#[derive(Parser, Debug)]
#[command(name = "nowpayments-watch", version, about = "NOWPayments status queries and payment watcher")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", global = true)]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,
    /// Use the sandbox endpoints
    #[arg(long, global = true)]
    sandbox: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// API availability
    Status,
    /// Currencies available for payments
    Currencies {
        /// Include network / logo / precision details
        #[arg(long)]
        full: bool,
    },
    /// Estimated amount in `to` for `amount` of `from`, plus the minimum
    Estimate {
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "usd")]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Current state of one payment
    Payment { payment_id: String },
    /// Follow payments over the WebSocket until all reach a final status
    Watch {
        /// Payment ids; defaults to `payments` from the config file
        payment_ids: Vec<String>,
        /// Skip the initial REST lookup of each payment
        #[arg(long)]
        no_seed: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let mut config = WatchConfig::load(args.config_path.as_deref())
        .context("load config")?
        .with_api_key_override(std::env::var(API_KEY_ENV).ok());
    if args.sandbox {
        config.sandbox = true;
    }
    info!(sandbox = config.sandbox, command = ?args.command, "starting nowpayments-watch");

    let client = NowPaymentsClient::with_config(config.client_config()?)
        .context("create REST client")?;

    match args.command {
        Command::Status => print_json(&client.get_status().await?),
        Command::Currencies { full: false } => print_json(&client.get_currencies(None).await?),
        Command::Currencies { full: true } => print_json(&client.get_full_currencies().await?),
        Command::Estimate { amount, from, to } => {
            let estimate = client
                .get_estimate_price(amount, &from, &to)
                .await
                .context("estimate price")?;
            print_json(&estimate)?;
            let minimum = client
                .get_min_amount(&from, &to)
                .await
                .context("minimum amount")?;
            print_json(&minimum)
        }
        Command::Payment { payment_id } => {
            let payment = client
                .get_payment_status(&payment_id)
                .await
                .with_context(|| format!("fetch payment {payment_id}"))?;
            print_json(&payment)
        }
        Command::Watch {
            payment_ids,
            no_seed,
        } => {
            let ids = if payment_ids.is_empty() {
                config.payments.clone()
            } else {
                payment_ids
            };
            if ids.is_empty() {
                return Err(anyhow!("no payment ids given and none configured"));
            }
            watch(&config, &client, ids, !no_seed).await
        }
    }
}

async fn watch(
    config: &WatchConfig,
    client: &NowPaymentsClient,
    payment_ids: Vec<String>,
    seed: bool,
) -> Result<()> {
    let mut watcher = PaymentWatcher::new(payment_ids.iter().cloned());

    if seed {
        for payment_id in &payment_ids {
            match client.get_payment_status(payment_id).await {
                Ok(payment) => {
                    info!(%payment_id, status = ?payment.payment_status, "initial status");
                    watcher.record(payment_id, payment.payment_status);
                }
                Err(err) => warn!(%payment_id, error = %err, "initial status lookup failed"),
            }
        }
    }

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let ws = NowPaymentsWebSocket::new(config.websocket_config()?).context("create websocket")?;
    let outcome = watcher.run(&ws, shutdown).await;
    ws.close().await;
    info!("websocket closed");

    let outcome = outcome?;
    print_json(watcher.statuses())?;
    match outcome {
        WatchOutcome::AllFinal => {
            info!("all watched payments are final");
            Ok(())
        }
        WatchOutcome::Cancelled => {
            info!("shutdown signal received");
            Ok(())
        }
        WatchOutcome::ConnectionClosed => Err(anyhow!("websocket closed before all payments were final")),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("render output")?;
    println!("{rendered}");
    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
