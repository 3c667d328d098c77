//! User-facing reply texts.
//!
//! Failure replies never carry backend error text or internal identifiers.

use super::inquiry::InquiryOutcome;
use super::settlement::SettlementOutcome;
use crate::config::Locale;
use crate::domain::ledger::StudentNo;

#[derive(Debug, Clone, Copy, Default)]
pub struct Replies {
    locale: Locale,
}

impl Replies {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    fn pick(&self, en: &str, tr: &str) -> String {
        let text = match self.locale {
            Locale::En => en,
            Locale::Tr => tr,
        };
        text.to_string()
    }

    pub fn greeting(&self) -> String {
        self.pick(
            "Hello! I can help you check and pay your tuition. Please write your student number.",
            "Merhaba! Size öğrenci harç sorgulama ve ödeme işlemlerinde yardımcı olabilirim. Lütfen öğrenci numaranızı yazın.",
        )
    }

    pub fn ask_student_no(&self) -> String {
        self.pick(
            "To look up your debt I need your student number.",
            "Borcunuzu sorgulayabilmem için öğrenci numaranızı yazmanız gerekiyor.",
        )
    }

    pub fn ask_payment_details(&self) -> String {
        self.pick(
            "To make a payment, please give your **student number** and the **amount**.",
            "Ödeme işlemi için **Öğrenci Numarası** ve **Miktar** belirtmelisiniz.",
        )
    }

    pub fn fallback(&self) -> String {
        self.pick(
            "Sorry, I did not understand. You can write for example: \"What is the debt of 12345?\" or \"Pay 100 for 12345\".",
            "Üzgünüm, anlayamadım. Örneğin şöyle yazabilirsiniz: \"12345 numaralı öğrencinin borcu ne kadar?\" veya \"12345 için 100 TL öde\".",
        )
    }

    pub fn inquiry(&self, student_no: &StudentNo, outcome: &InquiryOutcome) -> String {
        match (self.locale, outcome) {
            (Locale::En, InquiryOutcome::Found { student, total, .. }) => match &student.name {
                Some(name) => format!(
                    "Dear **{name}** ({student_no}), your current total tuition debt is **{total} TL**."
                ),
                None => format!("Student {student_no}: your current total tuition debt is **{total} TL**."),
            },
            (Locale::Tr, InquiryOutcome::Found { student, total, .. }) => match &student.name {
                Some(name) => format!(
                    "Sayın **{name}** ({student_no}), sistemden sorgulandı. Güncel toplam borcunuz: **{total} TL** dir."
                ),
                None => format!("{student_no} numaralı öğrencinin güncel toplam borcu: **{total} TL** dir."),
            },
            (Locale::En, InquiryOutcome::NotFound) => {
                format!("No student is registered with number {student_no}.")
            }
            (Locale::Tr, InquiryOutcome::NotFound) => {
                format!("{student_no} numarasıyla kayıtlı öğrenci bulunamadı.")
            }
            (Locale::En, InquiryOutcome::Failed) => {
                "The lookup failed. Please check the student number or try again later.".to_string()
            }
            (Locale::Tr, InquiryOutcome::Failed) => {
                "Sorgulama başarısız. Öğrenci numarası hatalı olabilir veya servise ulaşılamıyor.".to_string()
            }
        }
    }

    pub fn settlement(&self, outcome: &SettlementOutcome) -> String {
        use SettlementOutcome::*;
        match self.locale {
            Locale::En => match outcome {
                Settled { receipt, requested } if *requested != receipt.amount => format!(
                    "✅ Payment received for **{}**. You asked to pay {requested} TL, the outstanding amount was {} TL, so **{} TL** was charged.\n\n💰 Remaining balance: **{} TL**",
                    receipt.term, receipt.balance_before, receipt.amount, receipt.balance_after
                ),
                Settled { receipt, .. } => format!(
                    "✅ Payment received for **{}**.\n\n💰 **Paid:** {} TL\nPrevious balance: {} TL\nRemaining balance: **{} TL**",
                    receipt.term, receipt.amount, receipt.balance_before, receipt.balance_after
                ),
                AlreadyProcessed(receipt) => format!(
                    "This payment was already processed: {} TL for **{}**. Remaining balance: **{} TL**.",
                    receipt.amount, receipt.term, receipt.balance_after
                ),
                StudentNotRegistered => "This student number is not registered.".to_string(),
                NoTuitionRecord => "No tuition record was found for this student.".to_string(),
                NoTuitionRecordForTerm(term) => {
                    format!("No tuition record was found for the term **{term}**.")
                }
                NothingOwed => "You have nothing to pay at the moment. All debts are settled. 🎉".to_string(),
                OverpaymentRejected { amount, outstanding } => format!(
                    "The amount {amount} TL exceeds the outstanding balance of {outstanding} TL. Please pay at most {outstanding} TL."
                ),
                Failed => "An error occurred during the payment. Please try again later.".to_string(),
                PartialCommit => "Your payment was received but could not be confirmed yet. Please do not pay again; the tuition office will verify it.".to_string(),
            },
            Locale::Tr => match outcome {
                Settled { receipt, requested } if *requested != receipt.amount => format!(
                    "✅ **{}** dönemi için ödeme alındı. {requested} TL ödemek istediniz, kalan borç {} TL olduğu için **{} TL** tahsil edildi.\n\n💰 Kalan borç: **{} TL**",
                    receipt.term, receipt.balance_before, receipt.amount, receipt.balance_after
                ),
                Settled { receipt, .. } => format!(
                    "✅ İşlem Başarılı! **{}** dönemi için ödeme alındı.\n\n💰 **Ödenen:** {} TL\nÖnceki borç: {} TL\nKalan borç: **{} TL**",
                    receipt.term, receipt.amount, receipt.balance_before, receipt.balance_after
                ),
                AlreadyProcessed(receipt) => format!(
                    "Bu ödeme daha önce işlendi: **{}** dönemi için {} TL. Kalan borç: **{} TL**.",
                    receipt.term, receipt.amount, receipt.balance_after
                ),
                StudentNotRegistered => "Bu öğrenci numarası sistemde kayıtlı değil.".to_string(),
                NoTuitionRecord => "Bu öğrenciye ait hiç borç kaydı bulunamadı.".to_string(),
                NoTuitionRecordForTerm(term) => format!("**{term}** dönemine ait borç kaydı bulunamadı."),
                NothingOwed => {
                    "Şu anda ödenmesi gereken bir borcunuz bulunmuyor. Tüm borçlar ödenmiş. 🎉".to_string()
                }
                OverpaymentRejected { amount, outstanding } => format!(
                    "{amount} TL, kalan borç olan {outstanding} TL tutarını aşıyor. En fazla {outstanding} TL ödeyebilirsiniz."
                ),
                Failed => "Ödeme işlemi sırasında bir hata oluştu. Lütfen daha sonra tekrar deneyin.".to_string(),
                PartialCommit => "Ödemeniz alındı ancak henüz doğrulanamadı. Lütfen tekrar ödeme yapmayın; öğrenci işleri kontrol edecektir.".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::{IdempotencyKey, PaymentRecord, Student, StudentId};
    use crate::domain::money::{Amount, Balance};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn receipt(amount: rust_decimal::Decimal, before: rust_decimal::Decimal) -> PaymentRecord {
        let amount = Amount::new(amount).unwrap();
        PaymentRecord {
            idempotency_key: IdempotencyKey("m-1".into()),
            student_no: StudentNo::new("12345").unwrap(),
            amount,
            term: "Guz 2024".into(),
            balance_before: Balance::new(before),
            balance_after: Balance::new(before) - amount,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_greeting_is_deterministic() {
        let replies = Replies::new(Locale::En);
        assert_eq!(replies.greeting(), replies.greeting());
    }

    #[test]
    fn test_settled_reply_reports_amounts() {
        let receipt = receipt(dec!(100), dec!(450.00));
        let text = Replies::new(Locale::En).settlement(&SettlementOutcome::Settled {
            requested: receipt.amount,
            receipt,
        });
        assert!(text.contains("100.00"));
        assert!(text.contains("450.00"));
        assert!(text.contains("350.00"));
    }

    #[test]
    fn test_clamped_reply_mentions_requested_amount() {
        let receipt = receipt(dec!(50), dec!(50));
        let text = Replies::new(Locale::En).settlement(&SettlementOutcome::Settled {
            requested: Amount::new(dec!(80)).unwrap(),
            receipt,
        });
        assert!(text.contains("80.00"));
        assert!(text.contains("**50.00 TL** was charged"));
    }

    #[test]
    fn test_inquiry_reply_names_student_and_total() {
        let no = StudentNo::new("12345").unwrap();
        let outcome = InquiryOutcome::Found {
            student: Student {
                id: StudentId("s-1".into()),
                student_no: no.clone(),
                name: Some("Ayse Yilmaz".into()),
            },
            total: Balance::new(dec!(450)),
            lines: vec![],
        };
        let text = Replies::new(Locale::Tr).inquiry(&no, &outcome);
        assert!(text.contains("Ayse Yilmaz"));
        assert!(text.contains("12345"));
        assert!(text.contains("450.00 TL"));
    }

    #[test]
    fn test_failure_replies_are_generic() {
        let replies = Replies::new(Locale::En);
        let no = StudentNo::new("12345").unwrap();
        assert!(!replies.inquiry(&no, &InquiryOutcome::Failed).contains("error:"));
        assert_ne!(
            replies.settlement(&SettlementOutcome::PartialCommit),
            replies.settlement(&SettlementOutcome::Failed)
        );
    }
}
