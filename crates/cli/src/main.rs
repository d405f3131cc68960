use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cbr_rates_core::service::RatesService;
use cbr_rates_core::time::calendar::{DEFAULT_HISTORY_DAYS, MAX_HISTORY_DAYS, MIN_HISTORY_DAYS};
use cbr_rates_core::view::catalog::{self, SortKey, SortOrder};
use cbr_rates_core::view::chart::{self as chart_view, Trend};
use cbr_rates_core::view::convert::{self, Direction};

mod chart;

#[derive(Debug, Parser)]
#[command(name = "cbr_rates", about = "Central Bank of Russia exchange rates")]
struct Args {
    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List today's rates.
    List {
        /// Filter by CharCode or name.
        #[arg(long, short)]
        query: Option<String>,

        #[arg(long, value_enum, default_value_t = SortBy::Name)]
        sort: SortBy,

        /// Sort descending.
        #[arg(long)]
        desc: bool,
    },
    /// Rate history of one currency.
    History {
        /// CharCode (e.g. USD) or CBR ID (e.g. R01235).
        currency: String,

        #[arg(long, default_value_t = DEFAULT_HISTORY_DAYS, value_parser = days_parser())]
        days: u32,
    },
    /// Convert an amount between RUB and a currency.
    Convert {
        currency: String,

        amount: f64,

        /// Convert from the currency to RUB instead of from RUB.
        #[arg(long)]
        to_base: bool,
    },
    /// Render the history chart as SVG.
    Chart {
        currency: String,

        #[arg(long, default_value_t = DEFAULT_HISTORY_DAYS, value_parser = days_parser())]
        days: u32,

        #[arg(long, short)]
        out: PathBuf,

        #[arg(long, default_value_t = 1000)]
        width: u32,

        #[arg(long, default_value_t = 400)]
        height: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortBy {
    Name,
    Rate,
}

impl From<SortBy> for SortKey {
    fn from(v: SortBy) -> Self {
        match v {
            SortBy::Name => SortKey::Name,
            SortBy::Rate => SortKey::Rate,
        }
    }
}

fn days_parser() -> clap::builder::RangedI64ValueParser<u32> {
    clap::value_parser!(u32).range(i64::from(MIN_HISTORY_DAYS)..=i64::from(MAX_HISTORY_DAYS))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = cbr_rates_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let rates = RatesService::from_settings(&settings)?;

    let res = run(&rates, args).await;
    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
    }
    res
}

async fn run(rates: &RatesService, args: Args) -> anyhow::Result<()> {
    match args.command {
        Command::List { query, sort, desc } => {
            let snapshot = rates.snapshot().await?;
            let order = if desc { SortOrder::Desc } else { SortOrder::Asc };
            let rows = catalog::search_sorted(
                &snapshot.records,
                query.as_deref().unwrap_or_default(),
                sort.into(),
                order,
            );

            if args.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }

            println!("Rates as of {}", snapshot.as_of_date);
            for r in rows {
                println!("{:<48} {:>14}", catalog::list_label(r), catalog::rate_label(r));
            }
        }
        Command::History { currency, days } => {
            let record = rates.resolve(&currency).await?;
            let Some(history) = rates.history_for(&record, days).await? else {
                tracing::warn!(char_code = %record.char_code, days, "no history for range");
                println!("No history for {} in the last {days} days", record.char_code);
                return Ok(());
            };

            if args.json {
                println!("{}", serde_json::to_string_pretty(&history)?);
                return Ok(());
            }

            println!("{} ({}), per 1 unit", record.name, record.char_code);
            let mut prev: Option<f64> = None;
            for p in &history.points {
                let marker = match prev.map(|v| Trend::between(v, p.value)) {
                    Some(Trend::Up) => "▲",
                    Some(Trend::Down) => "▼",
                    None => " ",
                };
                println!("{}  {:>12.4} {marker}", p.date.format("%d.%m.%Y"), p.value);
                prev = Some(p.value);
            }
        }
        Command::Convert {
            currency,
            amount,
            to_base,
        } => {
            let record = rates.resolve(&currency).await?;
            let direction = if to_base {
                Direction::ToBase
            } else {
                Direction::FromBase
            };
            let conversion = convert::convert(&record, amount, direction)?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&conversion)?);
            } else {
                println!("{}", conversion.summary());
            }
        }
        Command::Chart {
            currency,
            days,
            out,
            width,
            height,
        } => {
            let record = rates.resolve(&currency).await?;
            let Some(history) = rates.history_for(&record, days).await? else {
                anyhow::bail!("no history for {} in the last {days} days", record.char_code);
            };

            let segments = chart_view::segments(&history);
            let title = format!("{} ({})", record.name, record.char_code);
            chart::render_svg(&out, &title, &history, &segments, (width, height))
                .with_context(|| format!("failed to render chart to {}", out.display()))?;
            tracing::info!(path = %out.display(), points = history.points.len(), "chart written");
        }
    }

    Ok(())
}

fn init_sentry(settings: &cbr_rates_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
