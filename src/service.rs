//! Wiring of the components from one `AppConfig`.

use crate::application::classifier::ClassifierAdapter;
use crate::application::dispatcher::ActionDispatcher;
use crate::application::inquiry::DebtInquiry;
use crate::application::intake::MessageIntake;
use crate::application::replies::Replies;
use crate::application::settlement::DebtSettlement;
use crate::config::AppConfig;
use crate::domain::ports::{IntentClassifier, ReplySink, SettlementBackendRef};
use crate::error::Result;
use crate::infrastructure::openai::OpenAiClient;
use std::sync::Arc;

pub fn build_dispatcher(config: &AppConfig, backend: SettlementBackendRef) -> ActionDispatcher {
    ActionDispatcher::new(
        DebtInquiry::new(Arc::clone(&backend)),
        DebtSettlement::new(backend, &config.settlement),
        Replies::new(config.locale),
    )
}

pub fn build_classifier(config: &AppConfig) -> Result<Arc<dyn IntentClassifier>> {
    let model = OpenAiClient::new(&config.classifier)?;
    Ok(Arc::new(ClassifierAdapter::new(
        Arc::new(model),
        config.classifier.timeout,
    )))
}

pub fn build_intake(
    config: &AppConfig,
    classifier: Arc<dyn IntentClassifier>,
    backend: SettlementBackendRef,
    sink: Arc<dyn ReplySink>,
) -> MessageIntake {
    MessageIntake::new(
        classifier,
        Arc::new(build_dispatcher(config, backend)),
        sink,
        config.max_in_flight,
    )
}
