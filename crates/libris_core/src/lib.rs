//! Persistence core for library borrow/return records.
//! This crate is the single source of truth for lending invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::lend::{
    BookId, CategoryId, LendId, LendRecord, LendValidationError, LoanStatus, NewLendRecord,
    ReaderId,
};
pub use repo::lend_repo::{
    LendPage, LendPageQuery, LendRepository, RepoError, RepoResult, SqliteLendRepository,
};
pub use service::lend_service::{BorrowRequest, LendService, LendServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
