mod config_commands;
mod handlers;

use std::{path::PathBuf, sync::Arc};

use {
    bpi_client::{HttpNluClient, HttpQaClient, MemoryNluClient, NluClient, QaClient},
    bpi_config::{BpiConfig, Severity},
    bpi_gateway::GatewayState,
    bpi_protocol::DetectIntentRequest,
    bpi_sessions::BpiService,
    clap::{Parser, Subcommand},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "bpi", about = "bpi: business process layer in front of an NLU backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery).
    #[arg(long, global = true, env = "BPI_CONFIG")]
    config: Option<PathBuf>,
    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Answer from an in-process backend instead of the configured NLU host.
    #[arg(long, global = true, default_value_t = false)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Serve,
    /// Send one text turn through the handler pipeline and print the answer.
    Detect {
        /// Session path; a fresh one is generated when omitted.
        #[arg(long)]
        session: Option<String>,
        /// Language code, defaults to `nlu.default_language`.
        #[arg(long)]
        language: Option<String>,
        text: String,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(Commands::Config { action }) = cli.command {
        return config_commands::handle_config(action);
    }

    let mut config = config_commands::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind.clone() {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    check_config(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers)
        .enable_all()
        .build()?;
    runtime.block_on(run(cli, config))
}

fn check_config(config: &BpiConfig) -> anyhow::Result<()> {
    let result = bpi_config::validate(config);
    for d in &result.diagnostics {
        match d.severity {
            Severity::Error => error!(path = d.path, "{}", d.message),
            Severity::Warning => warn!(path = d.path, "{}", d.message),
        }
    }
    if result.has_errors() {
        anyhow::bail!(
            "invalid configuration: {} error(s)",
            result.count(Severity::Error)
        );
    }
    Ok(())
}

async fn run(cli: Cli, config: BpiConfig) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "bpi starting");

    let service = Arc::new(build_service(&config, cli.offline)?);

    match cli.command {
        None | Some(Commands::Serve) => serve(&config, service).await,
        Some(Commands::Detect {
            session,
            language,
            text,
        }) => {
            let session = session.unwrap_or_else(|| {
                format!("projects/local/agent/sessions/{}", uuid::Uuid::new_v4())
            });
            let language = language.unwrap_or_else(|| config.nlu.default_language.clone());
            let turn = service
                .detect_intent_turn(DetectIntentRequest::text(session, text, language))
                .await?;
            if let Some(updates) = turn.reconcile {
                updates.wait().await;
            }
            println!("{}", serde_json::to_string_pretty(&turn.response)?);
            Ok(())
        },
        Some(Commands::Config { .. }) => Ok(()),
    }
}

fn build_service(config: &BpiConfig, offline: bool) -> anyhow::Result<BpiService> {
    let nlu: Arc<dyn NluClient> = if offline {
        info!("using in-process NLU backend");
        Arc::new(MemoryNluClient::new())
    } else {
        Arc::new(nlu_client(config))
    };

    let mut builder = BpiService::builder(nlu, config);
    if config.qa.active && !offline {
        let qa: Arc<dyn QaClient> = Arc::new(HttpQaClient::new(config.qa.base_url()));
        info!(url = %config.qa.base_url(), "QA race enabled");
        builder = builder.with_qa(qa);
    }
    handlers::register(&mut builder, &config.session.fallback_intent)?;
    Ok(builder.build())
}

fn nlu_client(config: &BpiConfig) -> HttpNluClient {
    let nlu = &config.nlu;
    let client = HttpNluClient::new(nlu.base_url());
    info!(url = %client.base_url(), "NLU backend");
    match (&nlu.token, &nlu.user) {
        (Some(token), _) => client.with_bearer_token(token.clone()),
        (None, Some(user)) => client.with_basic_auth(user.clone(), nlu.password.clone()),
        (None, None) => client,
    }
}

async fn serve(config: &BpiConfig, service: Arc<BpiService>) -> anyhow::Result<()> {
    #[cfg(feature = "metrics")]
    let state = {
        let handle = bpi_metrics::init_metrics(bpi_metrics::MetricsRecorderConfig {
            enabled: config.metrics.enabled,
            global_labels: config
                .metrics
                .labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })?;
        GatewayState::with_metrics(service, config.metrics.enabled.then_some(handle))
    };
    #[cfg(not(feature = "metrics"))]
    let state = GatewayState::new(service);

    bpi_gateway::start_gateway(&config.server, state).await
}
