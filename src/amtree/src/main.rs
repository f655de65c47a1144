//! amtree: export, list and describe AM authentication journeys.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use amtree_client::{AmHttpFetcher, SessionBootstrap};
use amtree_core::config::AppConfig;
use amtree_core::{ExportError, ExportResult, SessionContext};
use amtree_journey::{describe, JourneyAssembler, JourneyDocument, JourneyLister};
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "amtree")]
#[command(about = "Export and inspect AM authentication journeys")]
#[command(version)]
struct Cli {
    /// Tenant URL including the AM context, e.g. https://am.example.com/am
    #[arg(long, global = true, env = "AMTREE__TENANT")]
    tenant: Option<String>,

    /// Realm to operate on (default: root)
    #[arg(long, global = true, env = "AMTREE__REALM")]
    realm: Option<String>,

    #[arg(long, global = true, env = "AMTREE__USERNAME")]
    username: Option<String>,

    #[arg(long, global = true, env = "AMTREE__PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// IDM access token, needed for email templates and config export
    #[arg(long, global = true, env = "AMTREE__BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    /// Max in-flight requests per operation (overrides config)
    #[arg(long, global = true, env = "AMTREE__EXPORT__MAX_CONCURRENT_FETCHES")]
    concurrency: Option<usize>,

    /// Human-readable logs instead of JSON
    #[arg(long, global = true, default_value_t = false)]
    plain_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List journeys in the realm with their custom/ootb verdict
    List,

    /// Export a journey with its nodes, scripts and email templates
    Export {
        journey: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize node types and scripts of a journey
    Describe {
        #[arg(required_unless_present = "file")]
        journey: Option<String>,

        /// Previously exported journey file
        #[arg(short, long, conflicts_with = "journey")]
        file: Option<PathBuf>,
    },

    /// Export an IDM configuration entity, e.g. `managed`
    ConfigExport {
        entity: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(plain: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "amtree=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if plain {
        builder.init();
    } else {
        builder.json().init();
    }
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(tenant) = &cli.tenant {
        config.tenant = tenant.clone();
    }
    if let Some(realm) = &cli.realm {
        config.realm = realm.clone();
    }
    if let Some(username) = &cli.username {
        config.username = Some(username.clone());
    }
    if let Some(password) = &cli.password {
        config.password = Some(password.clone());
    }
    if let Some(token) = &cli.bearer_token {
        config.bearer_token = Some(token.clone());
    }
    if let Some(concurrency) = cli.concurrency {
        config.export.max_concurrent_fetches = concurrency;
    }
}

async fn establish(config: &AppConfig) -> ExportResult<SessionContext> {
    let (Some(username), Some(password)) = (&config.username, &config.password) else {
        return Err(ExportError::Config(
            "username and password are required (--username/--password)".to_string(),
        ));
    };
    SessionBootstrap::new(&config.http)?
        .establish(
            &config.tenant,
            &config.realm,
            username,
            password,
            config.bearer_token.clone(),
        )
        .await
}

/// Pretty JSON to `output`, or stdout when absent.
fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Export written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn verdict(custom: bool) -> &'static str {
    if custom {
        "custom"
    } else {
        "ootb"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.plain_logs);

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    apply_overrides(&mut config, &cli);

    // Offline: describe an exported file without a session.
    if let Command::Describe {
        file: Some(path), ..
    } = &cli.command
    {
        let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let document: JourneyDocument = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not a journey export", path.display()))?;
        return emit(&describe(&document), None);
    }

    config.validate()?;
    info!(
        tenant = %config.tenant,
        realm = %config.realm,
        concurrency = config.export.max_concurrent_fetches,
        "Configuration loaded"
    );

    let session = establish(&config).await?;
    let fetcher = Arc::new(AmHttpFetcher::new(&config.http)?);
    let concurrency = config.export.max_concurrent_fetches;

    match cli.command {
        Command::List => {
            let listing = JourneyLister::new(fetcher)
                .with_concurrency(concurrency)
                .list(&session)
                .await?;
            for (journey, custom) in &listing {
                println!("{}\t{}", journey, verdict(*custom));
            }
        }
        Command::Export { journey, output } => {
            let document = JourneyAssembler::new(fetcher)
                .with_concurrency(concurrency)
                .assemble(&session, &journey)
                .await?;
            emit(&document, output.as_deref())?;
        }
        Command::Describe { journey, .. } => {
            let journey = journey.context("a journey name or --file is required")?;
            let document = JourneyAssembler::new(fetcher)
                .with_concurrency(concurrency)
                .assemble(&session, &journey)
                .await?;
            emit(&describe(&document), None)?;
        }
        Command::ConfigExport { entity, output } => {
            let value = fetcher
                .fetch_config_entity(&session, &entity)
                .await
                .map_err(ExportError::from)?;
            emit(&value, output.as_deref())?;
        }
    }
    Ok(())
}
