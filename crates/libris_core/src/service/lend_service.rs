//! Lend use-case service.
//!
//! # Responsibility
//! - Provide borrow/return/annotate entry points for the calling application.
//! - Compose repository reporting queries into activity summaries.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Returning a book sets `return_date` and `status` together.
//! - Service layer remains storage-agnostic.

use crate::model::lend::{BookId, LendId, LendRecord, NewLendRecord, ReaderId};
use crate::repo::lend_repo::{LendPage, LendPageQuery, LendRepository, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for lend use-cases.
#[derive(Debug)]
pub enum LendServiceError {
    /// Target lend record does not exist.
    LendNotFound(LendId),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for LendServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LendNotFound(id) => write!(f, "lend record not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent lend state: {details}"),
        }
    }
}

impl Error for LendServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LendServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::LendNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Request model for a borrow event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowRequest {
    /// Borrowing reader.
    pub reader_id: ReaderId,
    /// Borrowed book.
    pub book_id: BookId,
    /// Date the loan starts.
    pub lend_date: String,
    /// Optional annotation recorded with the loan.
    pub notes: Option<String>,
}

/// Lend service facade over repository implementations.
pub struct LendService<R: LendRepository> {
    repo: R,
}

impl<R: LendRepository> LendService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Records a borrow event as an outstanding loan.
    pub fn borrow(&self, request: &BorrowRequest) -> Result<LendRecord, LendServiceError> {
        let mut draft = NewLendRecord::on_loan(
            request.reader_id,
            request.book_id,
            request.lend_date.clone(),
        );
        draft.notes = request.notes.clone();

        let id = self.repo.insert(&draft)?;
        self.read_back(id, "created lend record not found in read-back")
    }

    /// Closes an outstanding loan on the given return date.
    ///
    /// Sets `return_date` and flips `status` in one update so the lifecycle
    /// invariant holds on every observable row.
    pub fn return_book(
        &self,
        id: LendId,
        return_date: &str,
    ) -> Result<LendRecord, LendServiceError> {
        let mut record = self.require(id)?;
        record.mark_returned(return_date);
        self.repo.update(&record)?;
        self.read_back(id, "returned lend record not found in read-back")
    }

    /// Replaces the free-text annotation on one record.
    pub fn annotate(
        &self,
        id: LendId,
        notes: Option<String>,
    ) -> Result<LendRecord, LendServiceError> {
        let mut record = self.require(id)?;
        record.notes = notes;
        self.repo.update(&record)?;
        self.read_back(id, "annotated lend record not found in read-back")
    }

    /// Gets one lend record by id, failing when absent.
    pub fn get_lend(&self, id: LendId) -> Result<LendRecord, LendServiceError> {
        self.require(id)
    }

    /// Full-row administrative update by primary key.
    pub fn update_lend(&self, record: &LendRecord) -> Result<(), LendServiceError> {
        self.repo.update(record)?;
        Ok(())
    }

    /// Returns one bounded window of records matching the query filters.
    pub fn page(&self, query: &LendPageQuery) -> Result<LendPage, LendServiceError> {
        Ok(self.repo.page(query)?)
    }

    /// Deletes all records with the given ids; unknown ids are ignored.
    pub fn delete_batch(&self, ids: &[LendId]) -> Result<usize, LendServiceError> {
        Ok(self.repo.delete_batch(ids)?)
    }

    /// Count of loans currently past their category lend period.
    pub fn overdue_count(&self) -> Result<u64, LendServiceError> {
        Ok(self.repo.overdue_count()?)
    }

    /// Count of the reader's lend records on or after `begin`.
    pub fn reader_lend_count_since(
        &self,
        begin: &str,
        reader_id: ReaderId,
    ) -> Result<u64, LendServiceError> {
        Ok(self.repo.reader_lend_count_since(begin, reader_id)?)
    }

    /// Count of the reader's lend records on or before `last_date`.
    pub fn reader_lend_count_through(
        &self,
        reader_id: ReaderId,
        last_date: &str,
    ) -> Result<u64, LendServiceError> {
        Ok(self.repo.reader_lend_count_through(reader_id, last_date)?)
    }

    /// Per-book borrow counts since `begin`, most borrowed first.
    ///
    /// Ties break on ascending book id for deterministic output.
    pub fn book_activity_since(
        &self,
        begin: &str,
    ) -> Result<Vec<(BookId, u64)>, LendServiceError> {
        let ids = self.repo.book_ids_lent_since(begin)?;
        let mut activity = Vec::with_capacity(ids.len());
        for book_id in ids {
            let count = self.repo.book_lend_count_since(begin, book_id)?;
            activity.push((book_id, count));
        }
        activity.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(activity)
    }

    /// Per-reader borrow counts since `begin`, most active first.
    ///
    /// Ties break on ascending reader id for deterministic output.
    pub fn reader_activity_since(
        &self,
        begin: &str,
    ) -> Result<Vec<(ReaderId, u64)>, LendServiceError> {
        let ids = self.repo.reader_ids_lent_since(begin)?;
        let mut activity = Vec::with_capacity(ids.len());
        for reader_id in ids {
            let count = self.repo.reader_lend_count_since(begin, reader_id)?;
            activity.push((reader_id, count));
        }
        activity.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(activity)
    }

    fn require(&self, id: LendId) -> Result<LendRecord, LendServiceError> {
        self.repo
            .get(id)?
            .ok_or(LendServiceError::LendNotFound(id))
    }

    fn read_back(
        &self,
        id: LendId,
        context: &'static str,
    ) -> Result<LendRecord, LendServiceError> {
        self.repo
            .get(id)?
            .ok_or(LendServiceError::InconsistentState(context))
    }
}
