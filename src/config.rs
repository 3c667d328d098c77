//! Process configuration, built once at startup and handed to each component.

use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// Which implementation serves inquiries and settlements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Read and write the tuition ledger directly.
    Ledger,
    /// Call the tuition office REST service.
    Rest,
}

/// What to do when a payment exceeds the outstanding balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OverpaymentPolicy {
    /// Accept it; the line keeps a negative balance as credit.
    Allow,
    /// Charge only the outstanding balance.
    Clamp,
    /// Refuse the payment.
    #[default]
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Locale {
    #[default]
    En,
    Tr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// JSON lines on stdin, replies as JSON lines on stdout.
    Stdio,
    /// Poll the chat store's REST table and insert replies into it.
    Rest,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Base URL of an OpenAI-compatible chat completions API.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RestBackendConfig {
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ChatStoreConfig {
    pub url: String,
    pub api_key: String,
    pub table: String,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SettlementConfig {
    pub overpayment: OverpaymentPolicy,
    /// Re-reads allowed after a conditional write lost a race.
    pub max_conflict_retries: u32,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            overpayment: OverpaymentPolicy::default(),
            max_conflict_retries: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub backend: BackendKind,
    pub rest_backend: RestBackendConfig,
    pub settlement: SettlementConfig,
    pub locale: Locale,
    pub transport: TransportKind,
    pub chat_store: Option<ChatStoreConfig>,
    pub ledger_seed: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub export_path: Option<PathBuf>,
    pub max_in_flight: usize,
}
