use crate::domain::intent::{Intent, IntentRecord};
use crate::domain::ports::{IntentClassifier, LanguageModel};
use crate::error::ClassificationError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Fixed instruction sent with every user message.
pub const INSTRUCTION: &str = r#"You are the assistant of a university tuition office.
Analyse the user's message and answer with a single JSON object and nothing else.

Intents:
- "QUERY_DEBT": the user asks about their tuition debt.
- "PAY_DEBT": the user wants to pay tuition.
- "GREETING": greetings and small talk.
- "UNKNOWN": anything else.

Output format:
{
  "intent": "QUERY_DEBT" | "PAY_DEBT" | "GREETING" | "UNKNOWN",
  "studentNo": student number as a string, or null,
  "amount": amount as a number, or null,
  "term": academic term (e.g. "Guz 2024"), or null
}"#;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawIntent {
    intent: Intent,
    #[serde(default)]
    student_no: Option<String>,
    #[serde(default)]
    amount: Option<serde_json::Number>,
    #[serde(default)]
    term: Option<String>,
}

/// Removes markdown fences and any prose around the JSON object.
fn strip_wrapping(raw: &str) -> Result<&str, ClassificationError> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }
    if text.is_empty() {
        return Err(ClassificationError::EmptyResponse);
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(ClassificationError::Malformed(text.chars().take(80).collect())),
    }
}

fn to_decimal(number: &serde_json::Number) -> Result<Decimal, ClassificationError> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| ClassificationError::Schema(format!("amount {text}: {e}")))
}

/// Parses and validates classifier output. Any deviation from the schema is an error.
pub fn parse_intent(raw: &str) -> Result<IntentRecord, ClassificationError> {
    let payload = strip_wrapping(raw)?;
    let parsed: RawIntent = serde_json::from_str(payload).map_err(|e| {
        if e.is_data() {
            ClassificationError::Schema(e.to_string())
        } else {
            ClassificationError::Malformed(e.to_string())
        }
    })?;

    let student_no = match parsed.student_no {
        Some(no) if no.trim().is_empty() => {
            return Err(ClassificationError::Schema("studentNo is empty".into()));
        }
        Some(no) => Some(no.trim().to_string()),
        None => None,
    };

    let amount = match parsed.amount {
        Some(n) => {
            let value = to_decimal(&n)?;
            if value.is_sign_negative() && !value.is_zero() {
                return Err(ClassificationError::Schema("amount is negative".into()));
            }
            Some(value)
        }
        None => None,
    };

    let term = parsed
        .term
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(IntentRecord {
        intent: parsed.intent,
        student_no,
        amount,
        term,
    })
}

/// Classifier adapter over a language model: fixed instruction, bounded
/// call time, strict parsing, and `UNKNOWN` on every failure.
pub struct ClassifierAdapter {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl ClassifierAdapter {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    async fn try_classify(&self, text: &str) -> Result<IntentRecord, ClassificationError> {
        let raw = tokio::time::timeout(self.timeout, self.model.complete(INSTRUCTION, text))
            .await
            .map_err(|_| ClassificationError::Timeout)??;
        parse_intent(&raw)
    }
}

#[async_trait]
impl IntentClassifier for ClassifierAdapter {
    async fn classify(&self, text: &str) -> IntentRecord {
        match self.try_classify(text).await {
            Ok(record) => {
                tracing::debug!(intent = %record.intent, "message classified");
                record
            }
            Err(err) => {
                tracing::warn!(error = %err, "classification failed, treating as UNKNOWN");
                IntentRecord::unknown()
            }
        }
    }
}
