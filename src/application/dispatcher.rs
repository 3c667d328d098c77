use super::inquiry::DebtInquiry;
use super::replies::Replies;
use super::settlement::{DebtSettlement, SettlementRequest};
use crate::domain::intent::{Intent, IntentRecord};
use crate::domain::ledger::{IdempotencyKey, StudentNo};
use crate::domain::message::MessageId;
use crate::domain::money::Amount;

/// What a single intent asks the service to do. Each message is routed on
/// its own; no state carries over between messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Greet,
    AskStudentNo,
    Inquire(StudentNo),
    AskPaymentDetails,
    Settle {
        student_no: StudentNo,
        amount: Amount,
        term: Option<String>,
    },
    Fallback,
}

impl Action {
    /// Pure routing: validates the fields the intent needs, performs no I/O.
    pub fn route(record: &IntentRecord) -> Self {
        let student_no = record
            .student_no
            .as_deref()
            .and_then(|no| StudentNo::new(no).ok());

        match record.intent {
            Intent::Greeting => Action::Greet,
            Intent::QueryDebt => match student_no {
                Some(no) => Action::Inquire(no),
                None => Action::AskStudentNo,
            },
            Intent::PayDebt => {
                let amount = record.amount.and_then(|a| Amount::new(a).ok());
                match (student_no, amount) {
                    (Some(student_no), Some(amount)) => Action::Settle {
                        student_no,
                        amount,
                        term: record.term.clone(),
                    },
                    _ => Action::AskPaymentDetails,
                }
            }
            Intent::Unknown => Action::Fallback,
        }
    }
}

/// Routes a classified message to its handler and renders the reply.
pub struct ActionDispatcher {
    inquiry: DebtInquiry,
    settlement: DebtSettlement,
    replies: Replies,
}

impl ActionDispatcher {
    pub fn new(inquiry: DebtInquiry, settlement: DebtSettlement, replies: Replies) -> Self {
        Self {
            inquiry,
            settlement,
            replies,
        }
    }

    /// `message_id` keys the settlement so a redelivered message does not pay twice.
    pub async fn dispatch(&self, message_id: &MessageId, record: IntentRecord) -> String {
        let action = Action::route(&record);
        tracing::debug!(message_id = %message_id, intent = %record.intent, ?action, "dispatching");

        match action {
            Action::Greet => self.replies.greeting(),
            Action::AskStudentNo => self.replies.ask_student_no(),
            Action::AskPaymentDetails => self.replies.ask_payment_details(),
            Action::Fallback => self.replies.fallback(),
            Action::Inquire(student_no) => {
                let outcome = self.inquiry.inquire(&student_no).await;
                self.replies.inquiry(&student_no, &outcome)
            }
            Action::Settle {
                student_no,
                amount,
                term,
            } => {
                let request = SettlementRequest {
                    student_no,
                    amount,
                    term,
                    idempotency_key: IdempotencyKey(message_id.0.clone()),
                };
                let outcome = self.settlement.settle(request).await;
                self.replies.settlement(&outcome)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_route_greeting() {
        assert_eq!(Action::route(&IntentRecord::new(Intent::Greeting)), Action::Greet);
    }

    #[test]
    fn test_route_query_requires_student_no() {
        assert_eq!(Action::route(&IntentRecord::new(Intent::QueryDebt)), Action::AskStudentNo);
        assert_eq!(
            Action::route(&IntentRecord::new(Intent::QueryDebt).with_student_no("  ")),
            Action::AskStudentNo
        );
        assert_eq!(
            Action::route(&IntentRecord::new(Intent::QueryDebt).with_student_no("12345")),
            Action::Inquire(StudentNo::new("12345").unwrap())
        );
    }

    #[test]
    fn test_route_payment_requires_student_no_and_positive_amount() {
        let pay = IntentRecord::new(Intent::PayDebt);
        assert_eq!(Action::route(&pay), Action::AskPaymentDetails);
        assert_eq!(
            Action::route(&pay.clone().with_student_no("12345")),
            Action::AskPaymentDetails
        );
        assert_eq!(Action::route(&pay.clone().with_amount(dec!(100))), Action::AskPaymentDetails);
        assert_eq!(
            Action::route(&pay.clone().with_student_no("12345").with_amount(dec!(0))),
            Action::AskPaymentDetails
        );
        assert_eq!(
            Action::route(&pay.with_student_no("12345").with_amount(dec!(100)).with_term("Guz 2024")),
            Action::Settle {
                student_no: StudentNo::new("12345").unwrap(),
                amount: Amount::new(dec!(100)).unwrap(),
                term: Some("Guz 2024".into()),
            }
        );
    }

    #[test]
    fn test_route_unknown_falls_back() {
        assert_eq!(
            Action::route(&IntentRecord::unknown().with_student_no("12345")),
            Action::Fallback
        );
    }
}
