use clap::{Args, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

use hoopstat::cache::{compute_key, CacheLayer, CacheStore, NoopStore, QueryParams, SqliteStore};
use hoopstat::config::Config;
use hoopstat::logging;
use hoopstat::model::{classify_career, DynamicReport, PredictionReport, ThresholdSet};
use hoopstat::nba::{CachedNbaClient, NbaClient};

#[derive(Parser, Debug)]
#[command(name = "hoopstat")]
#[command(about = "Recency-weighted stat line probabilities for NBA players")]
#[command(version)]
struct Cli {
  /// Path to config file (default: $XDG_CONFIG_HOME/hoopstat/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// More log output (-v debug, -vv trace)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Estimate how often a player reaches each threshold
  Predict(PredictArgs),
  /// Find player ids by name
  Search {
    name: String,
  },
  /// Inspect or reset the local cache
  Cache {
    #[command(subcommand)]
    command: CacheCommand,
  },
}

#[derive(Args, Debug)]
struct PredictArgs {
  /// Player id (see `hoopstat search`)
  #[arg(short, long)]
  player: u64,

  /// Season start year, e.g. 2023 for 2023-24
  #[arg(short, long)]
  season: i32,

  /// Number of most recent games to use
  #[arg(short, long, default_value_t = 20)]
  games: usize,

  /// Thresholds as stat=t1,t2 (repeatable); replaces the configured set
  #[arg(short, long = "threshold", value_parser = ThresholdSet::parse_entry)]
  thresholds: Vec<(hoopstat::nba::StatCategory, Vec<f64>)>,

  /// Skip career-phase weighting
  #[arg(long)]
  no_career: bool,

  /// Seasons of history used to classify the career phase
  #[arg(long, default_value_t = 10)]
  career_seasons: i32,

  /// Also estimate at the season mean and one to three deviations above it
  #[arg(long)]
  dynamic: bool,

  /// Print the report as JSON
  #[arg(long)]
  json: bool,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
  #[serde(flatten)]
  report: &'a PredictionReport,
  #[serde(skip_serializing_if = "Option::is_none")]
  dynamic: Option<&'a DynamicReport>,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
  /// Remove entries whose namespace starts with a prefix (all by default)
  Clear {
    #[arg(short, long, default_value = "")]
    namespace: String,
  },
  /// Delete entries older than the longest TTL
  Purge,
  /// Entry counts per schema version
  Stats,
  /// Print the cache key for a namespace and parameters
  Key {
    namespace: String,
    /// Parameters as name=value
    params: Vec<String>,
    #[arg(long, default_value = "games:v2")]
    schema: String,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let cli = Cli::parse();

  // Load configuration
  let config = Config::load(cli.config.as_deref())?;
  let _log_guard = logging::init(&config.logging, cli.verbose);

  match cli.command {
    Command::Predict(args) => {
      if config.cache.enabled {
        predict(&CachedNbaClient::new(&config)?, &config, args).await
      } else {
        let client = CachedNbaClient::with_cache(NbaClient::new(&config)?, CacheLayer::new(NoopStore));
        predict(&client, &config, args).await
      }
    }
    Command::Search { name } => search(&config, &name).await,
    Command::Cache { command } => cache_command(&config, command),
  }
}

async fn predict<S: CacheStore>(
  client: &CachedNbaClient<S>,
  config: &Config,
  args: PredictArgs,
) -> Result<()> {
  let mut predictor = config.predictor()?;
  if args.no_career {
    predictor = predictor.without_career();
  }

  let thresholds = if args.thresholds.is_empty() {
    config.thresholds.clone()
  } else {
    args.thresholds.into_iter().collect()
  };
  if thresholds.is_empty() {
    return Err(eyre!("No thresholds configured"));
  }

  let games = client.recent_games(args.player, args.season, args.games).await?;

  let phase = if args.no_career || !config.model.career_weighting {
    None
  } else {
    let first = args.season - args.career_seasons.max(1) + 1;
    let history = client.career_averages(args.player, first..=args.season).await?;
    let phase = classify_career(&history, &config.model.phase_rules);
    info!(seasons = history.len(), %phase, "classified career phase");
    Some(phase)
  };

  let report = predictor.predict(&games, &thresholds, phase)?;

  let dynamic = if args.dynamic {
    match client.season_average(args.player, args.season).await? {
      Some(average) => Some(predictor.predict_dynamic(&games, &average)?),
      None => {
        warn!(player = args.player, season = args.season, "no season averages, skipping dynamic thresholds");
        None
      }
    }
  } else {
    None
  };

  if args.json {
    let output = JsonOutput {
      report: &report,
      dynamic: dynamic.as_ref(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
  } else {
    print_report(args.player, args.season, &report);
    if let Some(dynamic) = &dynamic {
      print_dynamic(dynamic);
    }
  }
  Ok(())
}

fn print_report(player: u64, season: i32, report: &PredictionReport) {
  print!("Player {player}, season {season}: {} games", report.n_games);
  match report.career_phase {
    Some(phase) => println!(", career phase {phase}"),
    None => println!(),
  }

  if let Some(regression) = &report.regression {
    let fatigue = &regression.fatigue;
    println!(
      "Fatigue risk {} (recent z {:+.2}), minutes trend {:+.2}/game{}",
      pct(fatigue.regression_risk),
      fatigue.z_score,
      regression.minutes.slope,
      if regression.minutes.declining { ", declining" } else { "" },
    );
    for (stat, shift) in regression.stationarity.iter().filter(|(_, s)| s.regime_change) {
      println!(
        "Baseline shift in {}: recent {:.1} vs {:.1}",
        stat.label(),
        shift.recent_mean,
        shift.full_mean
      );
    }
  }

  for stat in &report.stats {
    println!();
    println!("{} ({} observations)", stat.stat.label(), stat.n_observations);
    println!(
      "  {:>9}  {:>6}  {:>6}  {:>8}  {:>6}  {:>13}  {:>5}  {:>7}  {:<5}  {}",
      "threshold", "prob", "freq", "weighted", "career", "95% interval", "hits", "regress", "conf", "p"
    );

    for outcome in &stat.outcomes {
      let Some(r) = &outcome.result else {
        println!("  {:>9}  insufficient data", format!(">= {}", outcome.threshold));
        continue;
      };
      println!(
        "  {:>9}  {:>6}  {:>6}  {:>8}  {:>6}  {:>13}  {:>5}  {:>7}  {:<5}  {:.3}{}",
        format!(">= {}", r.threshold),
        pct(r.probability()),
        pct(r.frequency),
        pct(r.weighted_frequency),
        r.career_weighted_frequency.map(pct).unwrap_or_else(|| "-".to_string()),
        format!("{}-{}", pct(r.interval.lower), pct(r.interval.upper)),
        format!("{}/{}", r.n_exceeds, r.n_total),
        outcome
          .regression
          .map(|a| pct(a.composite_regression_probability))
          .unwrap_or_else(|| "-".to_string()),
        r.confidence.to_string(),
        r.p_value,
        if r.significant { " *" } else { "" },
      );
    }
  }
}

fn print_dynamic(report: &DynamicReport) {
  println!();
  println!("Season {} averages as thresholds", report.season);
  for stat in &report.stats {
    println!();
    println!(
      "{} (mean {:.1}, sd {:.1})",
      stat.stat.label(),
      stat.ladder.mean,
      stat.ladder.std
    );
    for outcome in &stat.outcomes {
      println!(
        "  {:<9}  >= {:<6.1}  freq {:>6}  weighted {:>6}",
        outcome.step.to_string(),
        outcome.threshold,
        pct(outcome.result.frequency),
        pct(outcome.result.weighted_frequency),
      );
    }
  }
}

fn pct(p: f64) -> String {
  format!("{:.1}%", p * 100.0)
}

async fn search(config: &Config, name: &str) -> Result<()> {
  let client = NbaClient::new(config)?;
  let players = client.search_players(name).await?;
  if players.is_empty() {
    println!("No players match \"{name}\"");
  }
  for player in players {
    println!(
      "{:>8}  {:<28}  {:<4}  {}",
      player.id,
      player.full_name(),
      player.position.as_deref().unwrap_or("-"),
      player.team.as_deref().unwrap_or("-"),
    );
  }
  Ok(())
}

fn cache_command(config: &Config, command: CacheCommand) -> Result<()> {
  match command {
    CacheCommand::Key {
      namespace,
      params,
      schema,
    } => {
      let params = params
        .iter()
        .map(|raw| parse_param(raw))
        .collect::<Result<QueryParams>>()?;
      println!("{}", compute_key(&namespace, &params, &schema));
    }
    CacheCommand::Clear { namespace } => {
      let removed = open_cache(config)?.invalidate(&namespace)?;
      println!("Removed {removed} entries");
    }
    CacheCommand::Purge => {
      let removed = open_cache(config)?.purge_expired()?;
      println!("Purged {removed} expired entries");
    }
    CacheCommand::Stats => {
      let counts = open_cache(config)?.store().schema_counts()?;
      if counts.is_empty() {
        println!("Cache is empty ({})", config.cache_path().display());
      }
      for (schema, count) in counts {
        println!("{schema:<24} {count}");
      }
    }
  }
  Ok(())
}

fn open_cache(config: &Config) -> Result<CacheLayer<SqliteStore>> {
  let store = SqliteStore::open(&config.cache_path())?;
  Ok(CacheLayer::new(store).with_ttl_policy(config.ttl_policy()))
}

/// `name=value`, where value is JSON if it parses as JSON and a string otherwise.
fn parse_param(raw: &str) -> Result<(String, Value)> {
  let (name, value) = raw
    .split_once('=')
    .ok_or_else(|| eyre!("Expected name=value, got {}", raw))?;
  let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
  Ok((name.to_string(), value))
}
