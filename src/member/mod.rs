//! Member module
//!
//! Member CRUD plus the transactional account transfer built on top of it.

pub mod error;
pub mod models;
pub mod service;
pub mod state;
pub mod store;
pub mod tx;

// Re-export commonly used types
pub use error::MemberError;
pub use models::Member;
pub use service::{TransferService, VALIDATION_FAILURE_ID};
pub use state::TransferState;
pub use store::MemberStore;
pub use tx::{
    ManualTransaction, ManualTransactionManager, PoolTransaction, PoolTransactionManager,
    TransactionContext, TransactionManager,
};
