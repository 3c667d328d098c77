//! Domain layer: tuition ledger records, chat messages, intents and the
//! ports the application layer drives.

pub mod intent;
pub mod ledger;
pub mod message;
pub mod money;
pub mod ports;
