//! Account store — PostgreSQL persistence for accounts and audit events.

pub mod db;
pub mod sweep;

pub use db::AccountStore;
pub use sweep::sweep_daemon;
