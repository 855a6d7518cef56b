// ABOUTME: CLI for the strata dispatch engine.
// ABOUTME: Dispatches a file or stdin to extraction strategies, fans out, or prints the preference table as JSON.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use strata_dispatch::{
    builtin_registry, load_builtin_preferences, BoundedDispatcher, DispatchOptions,
    DispatchResult, Document, FanoutDispatcher, PoolRegistry, PreferenceModel, PreferenceSource,
};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code when dispatch completed but no strategy produced data.
const EXIT_EMPTY: u8 = 2;

/// Route documents to extraction strategies and print JSON.
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(about = "Route documents to extraction strategies and print JSON", long_about = None)]
struct Args {
    /// Preference file (JSON) mapping content types to ordered strategy ids
    #[arg(long, global = true)]
    prefs: Option<PathBuf>,

    /// Engine properties file (JSON object, e.g. {"parser.timeout": 5})
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override a single property, e.g. --set parser.maxThread=8
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    set: Vec<String>,

    /// Include worker pool statistics in the output
    #[arg(long, global = true)]
    stats: bool,

    /// Output compact JSON instead of pretty
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Try the preferred strategies in order and print the first result
    Dispatch {
        /// Input file, or "-" for stdin
        input: String,

        /// URL the content was fetched from
        #[arg(long)]
        url: String,

        /// Content type (default: text/html)
        #[arg(long = "content-type", default_value = "text/html")]
        content_type: String,

        /// Run only this strategy instead of the preference list
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Run every accepting strategy and print each outcome
    Fanout {
        /// Input file, or "-" for stdin
        input: String,

        /// URL the content was fetched from
        #[arg(long)]
        url: String,

        /// Content type (default: text/html)
        #[arg(long = "content-type", default_value = "text/html")]
        content_type: String,
    },
    /// Print content types and their resolved strategy order
    Prefs,
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strata_dispatch=info,strata=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(args: &Args) -> Result<ExitCode> {
    let options = load_options(args.config.as_deref(), &args.set)?;
    let prefs = load_prefs(args.prefs.as_deref())?;

    match &args.command {
        Command::Prefs => {
            let entries: Vec<_> = prefs.entries().collect();
            print_json(&json!(entries), args.compact)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Dispatch {
            input,
            url,
            content_type,
            strategy,
        } => {
            let document = Document::new(url.as_str(), content_type.as_str(), load_bytes(input)?);
            let pool = PoolRegistry::initialize(options.pool.clone())?;
            let dispatcher = BoundedDispatcher::new(
                Arc::new(prefs),
                Arc::new(builtin_registry()),
                pool.clone(),
                options.parse_timeout,
            );

            info!("dispatching {} as {}", url, content_type);
            let result = match strategy {
                Some(id) => dispatcher.dispatch_by_id(id, &document),
                None => dispatcher.dispatch(&document, content_type),
            };

            let mut output = json!({ "url": url, "result": result });
            if args.stats {
                output["stats"] = json!(pool.stats());
            }
            PoolRegistry::shutdown();
            print_json(&output, args.compact)?;

            Ok(exit_for(&result))
        }
        Command::Fanout {
            input,
            url,
            content_type,
        } => {
            let document = Document::new(url.as_str(), content_type.as_str(), load_bytes(input)?);
            let pool = PoolRegistry::initialize(options.pool.clone())?;
            let fanout = FanoutDispatcher::new(Arc::new(builtin_registry()), pool.clone());

            info!("fanning out {}", url);
            let receipt = fanout.dispatch_all(&document);
            let skipped = receipt.skipped.clone();
            let rejected = receipt.rejected.clone();

            let mut produced = 0;
            let outcomes: Vec<Value> = receipt
                .wait()
                .into_iter()
                .map(|(strategy, outcome)| match outcome {
                    Ok(Some(payload)) => {
                        produced += 1;
                        json!({ "strategy": strategy, "ok": true, "payload": payload, "error": null })
                    }
                    Ok(None) => {
                        json!({ "strategy": strategy, "ok": true, "payload": null, "error": null })
                    }
                    Err(err) => json!({
                        "strategy": strategy,
                        "ok": false,
                        "payload": null,
                        "error": err.to_string()
                    }),
                })
                .collect();

            let mut output = json!({
                "url": url,
                "outcomes": outcomes,
                "skipped": skipped,
                "rejected": rejected,
            });
            if args.stats {
                output["stats"] = json!(pool.stats());
            }
            PoolRegistry::shutdown();
            print_json(&output, args.compact)?;

            Ok(if produced > 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_EMPTY)
            })
        }
    }
}

fn exit_for(result: &DispatchResult) -> ExitCode {
    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_EMPTY)
    }
}

/// Reads properties from the config file, then applies `--set` overrides.
fn load_options(config: Option<&Path>, overrides: &[String]) -> Result<DispatchOptions> {
    let mut props: HashMap<String, String> = HashMap::new();

    if let Some(path) = config {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let parsed: serde_json::Map<String, Value> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        for (key, value) in parsed {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            props.insert(key, value);
        }
    }

    for pair in overrides {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("--set expects KEY=VALUE, got {:?}", pair);
        };
        props.insert(key.trim().to_string(), value.trim().to_string());
    }

    debug!("engine properties: {:?}", props);
    Ok(DispatchOptions::from_properties(&props))
}

fn load_prefs(path: Option<&Path>) -> Result<PreferenceModel> {
    match path {
        Some(path) => Ok(PreferenceModel::build(&PreferenceSource::from_path(path)?)),
        None => Ok(load_builtin_preferences()?),
    }
}

fn load_bytes(target: &str) -> Result<Vec<u8>> {
    if target == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        return Ok(buf);
    }

    let path = PathBuf::from(target);
    if !path.exists() {
        return Err(anyhow!("file not found: {}", target));
    }
    Ok(fs::read(path)?)
}

fn print_json(value: &Value, compact: bool) -> Result<()> {
    if compact {
        println!("{}", serde_json::to_string(value)?);
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}
