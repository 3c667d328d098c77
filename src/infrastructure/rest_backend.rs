use crate::config::RestBackendConfig;
use crate::domain::ledger::{
    BalanceUpdate, IdempotencyKey, PaymentRecord, Student, StudentId, StudentNo, TuitionBalance,
};
use crate::domain::money::Balance;
use crate::domain::ports::SettlementBackend;
use crate::error::{BackendError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

const INQUIRY_PATH: &str = "/api/v1/mobile/inquiry";
const PAYMENT_PATH: &str = "/api/v1/banking/payment";

/// Accepts amounts sent either as JSON numbers or as strings.
fn lenient_decimal<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let text = match &value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.trim().to_string(),
        other => return Err(serde::de::Error::custom(format!("expected amount, got {other}"))),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InquiryResponse {
    student_name: Option<String>,
    #[serde(default)]
    details: Vec<DebtDetail>,
}

#[derive(Debug, Deserialize)]
struct DebtDetail {
    term: String,
    #[serde(deserialize_with = "lenient_decimal")]
    balance: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentRequest<'a> {
    student_no: &'a str,
    amount: Decimal,
    term: &'a str,
}

/// Settlement backend over the tuition office REST service.
///
/// The service owns the balance arithmetic; the idempotency key is passed as
/// an `Idempotency-Key` header so a retried payment is not applied twice.
pub struct RestBackend {
    client: Client,
    base_url: String,
}

impl RestBackend {
    pub fn new(config: &RestBackendConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn inquiry(&self, student_no: &StudentNo) -> std::result::Result<Option<InquiryResponse>, BackendError> {
        tracing::debug!(student_no = %student_no, "GET {}", INQUIRY_PATH);
        let response = self
            .client
            .get(format!("{}{}", self.base_url, INQUIRY_PATH))
            .query(&[("studentNo", student_no.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response
                    .json::<InquiryResponse>()
                    .await
                    .map_err(|e| BackendError::Protocol(e.to_string()))?;
                Ok(Some(body))
            }
            status => Err(BackendError::Protocol(format!("inquiry returned {status}"))),
        }
    }
}

#[async_trait]
impl SettlementBackend for RestBackend {
    async fn resolve_student(&self, student_no: &StudentNo) -> std::result::Result<Option<Student>, BackendError> {
        Ok(self.inquiry(student_no).await?.map(|body| Student {
            id: StudentId(student_no.as_str().to_string()),
            student_no: student_no.clone(),
            name: body.student_name,
        }))
    }

    async fn get_balance(&self, student: &Student) -> std::result::Result<Vec<TuitionBalance>, BackendError> {
        let body = self
            .inquiry(&student.student_no)
            .await?
            .ok_or(BackendError::NotFound)?;
        Ok(body
            .details
            .into_iter()
            .map(|detail| TuitionBalance {
                student_id: student.id.clone(),
                term: detail.term,
                balance: Balance::new(detail.balance),
            })
            .collect())
    }

    async fn find_payment(&self, _key: &IdempotencyKey) -> std::result::Result<Option<PaymentRecord>, BackendError> {
        Ok(None)
    }

    async fn apply_payment(
        &self,
        update: BalanceUpdate,
        record: PaymentRecord,
    ) -> std::result::Result<PaymentRecord, BackendError> {
        let request = PaymentRequest {
            student_no: record.student_no.as_str(),
            amount: record.amount.value(),
            term: &update.term,
        };
        tracing::info!(student_no = %record.student_no, term = %update.term, "POST {}", PAYMENT_PATH);

        let response = self
            .client
            .post(format!("{}{}", self.base_url, PAYMENT_PATH))
            .header("Idempotency-Key", record.idempotency_key.0.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    BackendError::Transport(e.to_string())
                } else {
                    // The request may have reached the service.
                    BackendError::PartialCommit(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(BackendError::NotFound),
            StatusCode::CONFLICT => Err(BackendError::DuplicatePayment(record.idempotency_key.0)),
            status if status.is_success() => {
                // Accepted only once the whole response has arrived.
                response
                    .bytes()
                    .await
                    .map_err(|e| BackendError::PartialCommit(format!("payment response unreadable: {e}")))?;
                Ok(record)
            }
            status if status.is_server_error() => Err(BackendError::PartialCommit(format!(
                "payment returned {status}"
            ))),
            status => Err(BackendError::Protocol(format!("payment returned {status}"))),
        }
    }
}
