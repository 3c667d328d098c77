//! Application layer: classification, routing and the two tuition handlers.
//!
//! The flow for every inbound message is intake -> classifier -> dispatcher
//! -> inquiry or settlement -> reply. Handlers run against a
//! `SettlementBackend`, so the same logic serves the direct ledger and the
//! REST service.

pub mod classifier;
pub mod dispatcher;
pub mod inquiry;
pub mod intake;
pub mod locks;
pub mod replies;
pub mod settlement;
