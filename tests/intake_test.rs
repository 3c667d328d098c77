mod common;

use common::{FailingSink, ScriptedClassifier, balance_of, ledger_backend, seeded_ledger, student_no};
use rust_decimal_macros::dec;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tuition_desk::application::dispatcher::ActionDispatcher;
use tuition_desk::application::inquiry::DebtInquiry;
use tuition_desk::application::intake::MessageIntake;
use tuition_desk::application::replies::Replies;
use tuition_desk::application::settlement::DebtSettlement;
use tuition_desk::config::{Locale, SettlementConfig};
use tuition_desk::domain::intent::{Intent, IntentRecord};
use tuition_desk::domain::message::{InboundMessage, MessageId, Sender};
use tuition_desk::domain::money::Balance;
use tuition_desk::domain::ports::{IntentClassifier, LedgerStore, ReplySink, SettlementBackendRef};
use tuition_desk::infrastructure::in_memory::InMemoryLedger;
use tuition_desk::interfaces::channel::channel_transport;

fn classifier() -> Arc<ScriptedClassifier> {
    Arc::new(
        ScriptedClassifier::default()
            .answer("merhaba", IntentRecord::new(Intent::Greeting))
            .answer(
                "12345 borcum ne kadar?",
                IntentRecord::new(Intent::QueryDebt).with_student_no("12345"),
            )
            .answer(
                "12345 için 100 TL öde",
                IntentRecord::new(Intent::PayDebt)
                    .with_student_no("12345")
                    .with_amount(dec!(100)),
            ),
    )
}

fn intake(backend: SettlementBackendRef, sink: Arc<dyn ReplySink>, max_in_flight: usize) -> MessageIntake {
    let dispatcher = ActionDispatcher::new(
        DebtInquiry::new(Arc::clone(&backend)),
        DebtSettlement::new(backend, &SettlementConfig::default()),
        Replies::new(Locale::Tr),
    );
    MessageIntake::new(classifier(), Arc::new(dispatcher), sink, max_in_flight)
}

fn system(id: &str, content: &str) -> InboundMessage {
    InboundMessage {
        sender: Sender::System,
        ..InboundMessage::from_user(id, content)
    }
}

async fn ledger() -> InMemoryLedger {
    seeded_ledger(&[("Guz 2024", dec!(450))]).await
}

#[tokio::test]
async fn test_one_reply_per_user_message() {
    let ledger = ledger().await;
    let (inbound, feed, sink, mut replies) = channel_transport(16);
    let intake = intake(ledger_backend(&ledger), Arc::new(sink), 4);

    inbound.send(InboundMessage::from_user("1", "merhaba")).await.unwrap();
    inbound.send(system("2", "Merhaba! ...")).await.unwrap();
    inbound.send(InboundMessage::from_user("3", "12345 borcum ne kadar?")).await.unwrap();
    inbound.send(InboundMessage::from_user("4", "hava nasıl?")).await.unwrap();
    drop(inbound);

    let stats = intake.run(feed).await;
    assert_eq!(stats.received, 4);
    assert_eq!(stats.skipped_own, 1);
    assert_eq!(stats.replied, 3);

    let mut answered = Vec::new();
    while let Ok(reply) = replies.try_recv() {
        assert_eq!(reply.sender, Sender::System);
        assert!(!reply.content.is_empty());
        answered.push(reply.in_reply_to.unwrap());
    }
    answered.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        answered,
        vec![MessageId("1".into()), MessageId("3".into()), MessageId("4".into())]
    );
}

#[tokio::test]
async fn test_own_replies_are_never_answered() {
    let ledger = ledger().await;
    let (_inbound, _feed, sink, _replies) = channel_transport(1);
    let intake = intake(ledger_backend(&ledger), Arc::new(sink), 1);

    assert!(intake.handle(&system("9", "12345 için 100 TL öde")).await.is_none());
    assert_eq!(balance_of(&ledger, "Guz 2024").await, Balance::new(dec!(450)));
}

#[tokio::test]
async fn test_redelivered_payment_message_pays_once() {
    let ledger = ledger().await;
    let (inbound, feed, sink, mut replies) = channel_transport(16);
    let intake = intake(ledger_backend(&ledger), Arc::new(sink), 8);

    for _ in 0..3 {
        inbound
            .send(InboundMessage::from_user("7", "12345 için 100 TL öde"))
            .await
            .unwrap();
    }
    drop(inbound);

    let stats = intake.run(feed).await;
    assert_eq!(stats.replied, 3);

    let mut texts = Vec::new();
    while let Ok(reply) = replies.try_recv() {
        texts.push(reply.content);
    }
    assert_eq!(texts.iter().filter(|t| t.contains("İşlem Başarılı")).count(), 1);
    assert_eq!(texts.iter().filter(|t| t.contains("daha önce işlendi")).count(), 2);

    assert_eq!(balance_of(&ledger, "Guz 2024").await, Balance::new(dec!(350)));
    assert_eq!(ledger.payments(&student_no()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_emit_failures_are_counted() {
    let ledger = ledger().await;
    let (inbound, feed, _sink, _replies) = channel_transport(4);
    let intake = intake(ledger_backend(&ledger), Arc::new(FailingSink), 2);

    inbound.send(InboundMessage::from_user("1", "merhaba")).await.unwrap();
    inbound.send(InboundMessage::from_user("2", "merhaba")).await.unwrap();
    drop(inbound);

    let stats = intake.run(feed).await;
    assert_eq!(stats.replied, 0);
    assert_eq!(stats.emit_failures, 2);
}

/// Reports each classification as it starts, then answers slowly.
struct SlowClassifier {
    started: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl IntentClassifier for SlowClassifier {
    async fn classify(&self, text: &str) -> IntentRecord {
        let _ = self.started.send(text.to_string());
        tokio::time::sleep(Duration::from_millis(200)).await;
        IntentRecord::new(Intent::PayDebt)
            .with_student_no("12345")
            .with_amount(dec!(100))
    }
}

#[tokio::test]
async fn test_shutdown_finishes_messages_in_flight() {
    let ledger = ledger().await;
    let backend = ledger_backend(&ledger);
    let (inbound, feed, sink, mut replies) = channel_transport(4);
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let dispatcher = ActionDispatcher::new(
        DebtInquiry::new(Arc::clone(&backend)),
        DebtSettlement::new(backend, &SettlementConfig::default()),
        Replies::new(Locale::Tr),
    );
    let intake = MessageIntake::new(
        Arc::new(SlowClassifier { started: started_tx }),
        Arc::new(dispatcher),
        Arc::new(sink),
        4,
    );

    inbound
        .send(InboundMessage::from_user("1", "12345 için 100 TL öde"))
        .await
        .unwrap();
    let shutdown = async move {
        started_rx.recv().await;
    };

    // The feed stays open; only the shutdown signal ends the run.
    let stats = tokio::time::timeout(Duration::from_secs(5), intake.run_until(feed, shutdown))
        .await
        .unwrap();
    assert_eq!(stats.received, 1);
    assert_eq!(stats.replied, 1);

    let reply = replies.try_recv().unwrap();
    assert_eq!(reply.in_reply_to, Some(MessageId("1".into())));
    assert!(reply.content.contains("İşlem Başarılı"));
    assert_eq!(balance_of(&ledger, "Guz 2024").await, Balance::new(dec!(350)));
    drop(inbound);
}
