//! Quarry CLI - evaluate a declarative query over a JSON document,
//! optionally reaching named external backends (cache store, document
//! store) referenced from within the query.

use clap::Parser;
use quarry_cli::pipeline;
use quarry_query::BackendPlugin;
use quarry_query_mongodb::MongoPlugin;
use quarry_query_redis::RedisPlugin;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the file containing the query
    #[arg(long, short = 'q')]
    query: PathBuf,

    /// Path to the JSON source document
    #[arg(long = "src", short = 's')]
    source: PathBuf,

    /// Path to write the result to
    #[arg(long = "dest", short = 'd')]
    destination: PathBuf,

    /// Path to a YAML file of named backend connections
    #[arg(long = "conf", short = 'c')]
    configurations: Option<PathBuf>,

    /// Address of a single cache-store connection (default name)
    #[arg(long)]
    redis: Option<String>,

    /// Address of a single document-store connection (default name)
    #[arg(long)]
    mongo: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "QUARRY_LOG_LEVEL")]
    log_level: String,

    /// Log format: compact, full
    #[arg(long, default_value = "compact", env = "QUARRY_LOG_FORMAT")]
    log_format: String,
}

fn init_tracing(cli: &Cli) {
    // If RUST_LOG is set, use it directly; otherwise use our default
    // filter with all quarry crates at the specified level and noisy
    // driver crates at warn level.
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .expect("Invalid RUST_LOG environment variable")
    } else {
        tracing_subscriber::EnvFilter::new(format!(
            "quarry_cli={level},\
             quarry_query={level},\
             quarry_query_redis={level},\
             quarry_query_mongodb={level},\
             redis=warn,\
             mongodb=warn",
            level = cli.log_level
        ))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        _ => tracing_subscriber::fmt::layer() // "compact" or any other value
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    // The explicit backend list: each plugin is initialized once by the
    // configuration loader, in this order.
    let plugins: Vec<Arc<dyn BackendPlugin>> =
        vec![Arc::new(RedisPlugin::new()), Arc::new(MongoPlugin::new())];

    let mut overrides = HashMap::new();
    if let Some(address) = cli.redis.clone() {
        overrides.insert(quarry_query_redis::KIND.to_string(), address);
    }
    if let Some(address) = cli.mongo.clone() {
        overrides.insert(quarry_query_mongodb::KIND.to_string(), address);
    }

    let opts = pipeline::RunOptions {
        query: cli.query.clone(),
        source: cli.source.clone(),
        destination: cli.destination.clone(),
        configurations: cli.configurations.clone(),
        overrides,
    };

    pipeline::run(&opts, &plugins).await?;
    Ok(())
}
