//! Chain event streams

pub mod pair_created;

pub use pair_created::{decode_pair_created, ListenerConfig, PairCreated, PairCreatedListener};
