//! member_transfer - transactional member store
//!
//! CRUD over a single `member` table plus an all-or-nothing account transfer.
//!
//! # Modules
//!
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - connection pool and schema
//! - [`member`] - store, transaction managers and transfer service

pub mod config;
pub mod db;
pub mod logging;
pub mod member;

// Convenient re-exports at crate root
pub use config::{AppConfig, DatabaseConfig};
pub use db::Database;
pub use member::{
    ManualTransactionManager, Member, MemberError, MemberStore, PoolTransactionManager,
    TransactionContext, TransactionManager, TransferService, TransferState,
    VALIDATION_FAILURE_ID,
};
