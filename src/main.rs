use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tuition_desk::application::intake::{IntakeStats, MessageIntake};
use tuition_desk::config::{
    AppConfig, BackendKind, ChatStoreConfig, ClassifierConfig, Locale, OverpaymentPolicy,
    RestBackendConfig, SettlementConfig, TransportKind,
};
use tuition_desk::domain::ports::{
    LedgerStore, LedgerStoreBox, MessageFeed, ReplySink, SettlementBackendRef,
};
use tuition_desk::infrastructure::in_memory::InMemoryLedger;
use tuition_desk::infrastructure::ledger_backend::LedgerBackend;
use tuition_desk::infrastructure::rest_backend::RestBackend;
#[cfg(feature = "storage-rocksdb")]
use tuition_desk::infrastructure::rocksdb::RocksDBLedger;
use tuition_desk::interfaces::chat_store::ChatStoreClient;
use tuition_desk::interfaces::csv::balance_writer::BalanceWriter;
use tuition_desk::interfaces::csv::seed_reader::load_seed;
use tuition_desk::interfaces::stdio::{JsonLinesFeed, JsonLinesSink};
use tuition_desk::service;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Conversational tuition inquiry and payment service", long_about = None)]
struct Cli {
    /// Base URL of the OpenAI-compatible classifier API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    classifier_url: String,

    /// API key for the classifier
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    classifier_key: String,

    #[arg(long, env = "CLASSIFIER_MODEL", default_value = "gpt-3.5-turbo")]
    model: String,

    #[arg(long, default_value_t = 15)]
    classifier_timeout_secs: u64,

    /// Where balances live: the ledger directly, or the tuition REST service
    #[arg(long, value_enum, default_value_t = BackendKind::Ledger)]
    backend: BackendKind,

    /// Base URL of the tuition REST service (required with --backend rest)
    #[arg(long, env = "TUITION_API_URL")]
    api_url: Option<String>,

    #[arg(long, default_value_t = 10)]
    api_timeout_secs: u64,

    #[arg(long, value_enum, default_value_t = OverpaymentPolicy::Reject)]
    overpayment: OverpaymentPolicy,

    #[arg(long, default_value_t = 3)]
    max_conflict_retries: u32,

    #[arg(long, value_enum, default_value_t = Locale::En)]
    locale: Locale,

    /// CSV of `student_no,student_name,term,balance` rows loaded at startup
    #[arg(long)]
    ledger_seed: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Write the final ledger balances to this CSV on shutdown
    #[arg(long)]
    export: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = TransportKind::Stdio)]
    transport: TransportKind,

    /// Conversation store URL (required with --transport rest)
    #[arg(long, env = "SUPABASE_URL")]
    chat_store_url: Option<String>,

    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    chat_store_key: Option<String>,

    #[arg(long, default_value = "messages")]
    chat_table: String,

    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Messages processed concurrently
    #[arg(long, default_value_t = 16)]
    max_in_flight: usize,
}

impl Cli {
    fn into_config(self) -> Result<AppConfig> {
        let rest_backend = RestBackendConfig {
            base_url: match (self.backend, self.api_url) {
                (_, Some(url)) => url,
                (BackendKind::Rest, None) => miette::bail!("--api-url is required with --backend rest"),
                (BackendKind::Ledger, None) => String::new(),
            },
            timeout: Duration::from_secs(self.api_timeout_secs),
        };

        let chat_store = match (self.transport, self.chat_store_url, self.chat_store_key) {
            (TransportKind::Rest, Some(url), Some(api_key)) => Some(ChatStoreConfig {
                url,
                api_key,
                table: self.chat_table,
                poll_interval: Duration::from_millis(self.poll_interval_ms),
            }),
            (TransportKind::Rest, _, _) => {
                miette::bail!("--chat-store-url and --chat-store-key are required with --transport rest")
            }
            (TransportKind::Stdio, _, _) => None,
        };

        Ok(AppConfig {
            classifier: ClassifierConfig {
                base_url: self.classifier_url,
                api_key: self.classifier_key,
                model: self.model,
                timeout: Duration::from_secs(self.classifier_timeout_secs),
            },
            backend: self.backend,
            rest_backend,
            settlement: SettlementConfig {
                overpayment: self.overpayment,
                max_conflict_retries: self.max_conflict_retries,
            },
            locale: self.locale,
            transport: self.transport,
            chat_store,
            ledger_seed: self.ledger_seed,
            db_path: self.db_path,
            export_path: self.export,
            max_in_flight: self.max_in_flight,
        })
    }
}

async fn open_ledger(config: &AppConfig) -> Result<LedgerStoreBox> {
    let store: LedgerStoreBox = match &config.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Box::new(RocksDBLedger::open(path).into_diagnostic()?),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Box::new(InMemoryLedger::new())
        }
        None => Box::new(InMemoryLedger::new()),
    };

    if let Some(seed) = &config.ledger_seed {
        if !store.snapshot().await.into_diagnostic()?.is_empty() {
            tracing::info!(seed = %seed.display(), "ledger already populated, seed ignored");
            return Ok(store);
        }
        let file = File::open(seed).into_diagnostic()?;
        load_seed(store.as_ref(), file).await.into_diagnostic()?;
    }
    Ok(store)
}

async fn serve<F: MessageFeed>(intake: &MessageIntake, feed: F) -> IntakeStats {
    let interrupted = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("interrupted, shutting down");
    };
    intake.run_until(feed, interrupted).await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tuition_desk=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Cli::parse().into_config()?;

    let mut ledger_backend = None;
    let backend: SettlementBackendRef = match config.backend {
        BackendKind::Ledger => {
            let backend = Arc::new(LedgerBackend::new(open_ledger(&config).await?));
            ledger_backend = Some(Arc::clone(&backend));
            backend
        }
        BackendKind::Rest => Arc::new(RestBackend::new(&config.rest_backend).into_diagnostic()?),
    };
    let classifier = service::build_classifier(&config).into_diagnostic()?;

    let stats = match (&config.transport, &config.chat_store) {
        (TransportKind::Rest, Some(store_config)) => {
            let store = ChatStoreClient::new(store_config).into_diagnostic()?;
            let feed = store
                .feed(store_config.poll_interval)
                .await
                .into_diagnostic()?;
            let sink: Arc<dyn ReplySink> = Arc::new(store);
            let intake = service::build_intake(&config, classifier, backend, sink);
            serve(&intake, feed).await
        }
        _ => {
            let feed = JsonLinesFeed::new(tokio::io::BufReader::new(tokio::io::stdin()));
            let sink: Arc<dyn ReplySink> = Arc::new(JsonLinesSink::new(tokio::io::stdout()));
            let intake = service::build_intake(&config, classifier, backend, sink);
            serve(&intake, feed).await
        }
    };
    tracing::info!(replied = stats.replied, skipped = stats.skipped_own, "done");

    if let Some(path) = &config.export_path {
        match &ledger_backend {
            Some(backend) => {
                let snapshot = backend.ledger().snapshot().await.into_diagnostic()?;
                let file = File::create(path).into_diagnostic()?;
                BalanceWriter::new(file)
                    .write_balances(&snapshot)
                    .into_diagnostic()?;
            }
            None => tracing::warn!("--export is only supported with --backend ledger"),
        }
    }

    Ok(())
}
