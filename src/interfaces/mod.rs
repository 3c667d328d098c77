//! Edges of the service: chat transports and ledger seed/export files.

pub mod channel;
pub mod chat_store;
pub mod csv;
pub mod stdio;
