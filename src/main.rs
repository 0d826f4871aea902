use anyhow::{bail, Context};
use augur::{Config, SignalEngine};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: augur <SYMBOL> [--history N]";

struct Args {
    symbol: String,
    history: Option<usize>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut symbol = None;
    let mut history = None;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--history" => {
                let n = args.next().context("--history needs a row count")?;
                let rows = n
                    .parse::<usize>()
                    .with_context(|| format!("bad row count {:?}", n))?;
                history = Some(rows);
            }
            "-h" | "--help" => bail!(USAGE),
            _ if symbol.is_none() && !arg.starts_with('-') => symbol = Some(arg),
            _ => bail!("unexpected argument {:?}\n{}", arg, USAGE),
        }
    }

    Ok(Args {
        symbol: symbol.context(USAGE)?,
        history,
    })
}

fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "augur=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = parse_args()?;
    let config = Config::from_env();
    debug!(?config, "Loaded configuration");

    let engine = SignalEngine::from_config(&config);
    let report = engine
        .generate(&args.symbol)
        .with_context(|| format!("failed to generate signal for {}", args.symbol))?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(n) = args.history {
        let rows = engine.history().recent(n)?;
        info!(rows = rows.len(), path = %config.history_path.display(), "Recent signals");
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }

    Ok(())
}
