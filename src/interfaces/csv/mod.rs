pub mod balance_writer;
pub mod seed_reader;
