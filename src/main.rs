//! querygate - sanitize, classify and gate LLM-generated SQL.

mod chat;
mod cli;

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use cli::{Cli, Command};
use querygate::catalog::StaticCatalog;
use querygate::config::Config;
use querygate::db::MockExecutor;
use querygate::llm::{build_generator, LlmProvider};
use querygate::safety::SqlClassifier;
use querygate::sanitize::IdentifierSet;
use querygate::session::{Collaborators, ConversationSession, SessionActor};
use querygate::{logging, pipeline};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse_args();

    if cli.is_interactive() {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    match cli.command {
        Command::Sanitize {
            sql,
            identifiers,
            dialect,
            source,
            json,
        } => run_sanitize(&config, &sql, identifiers, &dialect, source.as_deref(), json),
        Command::Classify { sql, json } => run_classify(&config, &sql, json),
        Command::Chat { source, llm } => run_chat(config, source, llm).await,
    }
}

fn run_sanitize(
    config: &Config,
    sql: &str,
    identifiers: Vec<String>,
    descriptor: &str,
    source: Option<&str>,
    json: bool,
) -> Result<()> {
    let (identifiers, descriptor) = match source {
        Some(id) => {
            let source = config
                .data_source(id)
                .ok_or_else(|| anyhow!("Data source '{id}' not found in config file"))?;
            (
                IdentifierSet::from_schema(&source.schema()),
                source.descriptor()?.to_string(),
            )
        }
        None => (identifiers.into_iter().collect(), descriptor.to_string()),
    };

    let statement = pipeline::sanitize_for(sql, &identifiers, &descriptor);

    if json {
        println!("{}", serde_json::to_string_pretty(&statement)?);
    } else {
        println!("{}", statement.sanitized_text());
    }
    Ok(())
}

fn run_classify(config: &Config, sql: &str, json: bool) -> Result<()> {
    let classification = SqlClassifier::new(config.policy).classify(sql);

    if json {
        println!("{}", serde_json::to_string_pretty(&classification)?);
        return Ok(());
    }

    match classification.risk {
        Some(risk) => println!("{} ({risk} risk, needs confirmation)", classification.kind),
        None => println!("{}", classification.kind),
    }
    if let Some(warning) = &classification.warning {
        println!("{warning}");
    }
    Ok(())
}

async fn run_chat(mut config: Config, source: Option<String>, llm: Option<String>) -> Result<()> {
    if let Some(provider) = llm {
        config.llm.provider = provider.parse::<LlmProvider>().map_err(|e| anyhow!(e))?;
    }

    let catalog = StaticCatalog::from_config(&config)?;
    let source = match source.as_deref().or(config.default_data_source()) {
        Some(id) if catalog.contains(id) => id.to_string(),
        Some(id) => bail!("Data source '{id}' not found in config file"),
        None => bail!(
            "No data sources configured. Add a [data_sources.<id>] section to {}",
            Config::default_path().display()
        ),
    };
    if let Some(data_source) = config.data_source(&source) {
        info!("Data source {source}: {}", data_source.display_string());
    }

    let generator = build_generator(&config.llm, std::env::var("OPENAI_API_KEY").ok())?;
    let collaborators = Collaborators {
        generator,
        catalog: Arc::new(catalog.clone()),
        executor: Arc::new(MockExecutor::new()),
        classifier: SqlClassifier::new(config.policy),
    };

    let mut session = ConversationSession::new(&config.session);
    session.on_data_source_change(&source);
    let (handle, actor) = SessionActor::spawn(session, collaborators);
    let actor_task = tokio::spawn(actor.run());

    println!("querygate {} (dry run: statements are not sent to a database)", env!("CARGO_PKG_VERSION"));
    chat::run(handle, &catalog).await?;
    actor_task.await.context("Session actor panicked")?;
    Ok(())
}
