mod engine;

pub use engine::{constant_time_eq, random_hex, CryptoEngine};
