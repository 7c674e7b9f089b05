//! Lend record domain model.
//!
//! # Responsibility
//! - Define the canonical borrow/return row shared by repository and services.
//! - Enforce the status/return-date lifecycle invariant before persistence.
//!
//! # Invariants
//! - `status == OnLoan` implies `return_date` is unset.
//! - A set `return_date` implies `status == Returned`.
//! - Date fields are ISO-8601 calendar dates (`YYYY-MM-DD`); lexical order
//!   equals chronological order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Surrogate primary key of one lend/return row.
pub type LendId = i64;
/// Reader entity key. The reader itself is owned by another subsystem.
pub type ReaderId = i64;
/// Book entity key. The book itself is owned by another subsystem.
pub type BookId = i64;
/// Reader category key, referenced through `reader.category_id`.
pub type CategoryId = i64;

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").expect("valid date regex")
});

/// Loan lifecycle state.
///
/// Persisted as an integer: `0` while the book is out, `1` once returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Borrowed and not yet returned.
    OnLoan,
    /// Returned to the library.
    Returned,
}

/// Insert draft for one borrow transaction.
///
/// Carries everything except the row id, which the store assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLendRecord {
    /// Serialized as `r_id` to match external schema naming.
    #[serde(rename = "r_id")]
    pub reader_id: ReaderId,
    /// Serialized as `b_id` to match external schema naming.
    #[serde(rename = "b_id")]
    pub book_id: BookId,
    /// Date the item was borrowed.
    pub lend_date: String,
    /// Date the item came back. `None` while outstanding.
    pub return_date: Option<String>,
    /// Loan lifecycle state.
    pub status: LoanStatus,
    /// Free-text annotation.
    pub notes: Option<String>,
}

/// Full lend/return row as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendRecord {
    /// Surrogate primary key.
    pub id: LendId,
    /// Serialized as `r_id` to match external schema naming.
    #[serde(rename = "r_id")]
    pub reader_id: ReaderId,
    /// Serialized as `b_id` to match external schema naming.
    #[serde(rename = "b_id")]
    pub book_id: BookId,
    /// Date the item was borrowed.
    pub lend_date: String,
    /// Date the item came back. `None` while outstanding.
    pub return_date: Option<String>,
    /// Loan lifecycle state.
    pub status: LoanStatus,
    /// Free-text annotation.
    pub notes: Option<String>,
}

/// Validation failures for lend rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LendValidationError {
    /// A date field does not parse as `YYYY-MM-DD`.
    InvalidDate {
        field: &'static str,
        value: String,
    },
    /// Status says returned but no return date is present.
    ReturnDateRequired,
    /// Status says on loan but a return date is present.
    ReturnDateNotAllowed { return_date: String },
    /// Return date precedes the lend date.
    ReturnBeforeLend {
        lend_date: String,
        return_date: String,
    },
}

impl Display for LendValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDate { field, value } => {
                write!(f, "{field} must be a YYYY-MM-DD date, got `{value}`")
            }
            Self::ReturnDateRequired => {
                write!(f, "returned record must carry a return_date")
            }
            Self::ReturnDateNotAllowed { return_date } => write!(
                f,
                "on-loan record must not carry a return_date, got `{return_date}`"
            ),
            Self::ReturnBeforeLend {
                lend_date,
                return_date,
            } => write!(
                f,
                "return_date ({return_date}) must be >= lend_date ({lend_date})"
            ),
        }
    }
}

impl Error for LendValidationError {}

/// Checks one date argument against the ISO calendar-date shape.
///
/// Shared by model validation and repository query-argument checks.
pub fn validate_date(field: &'static str, value: &str) -> Result<(), LendValidationError> {
    if ISO_DATE_RE.is_match(value) {
        Ok(())
    } else {
        Err(LendValidationError::InvalidDate {
            field,
            value: value.to_string(),
        })
    }
}

fn validate_lend_fields(
    lend_date: &str,
    return_date: Option<&str>,
    status: LoanStatus,
) -> Result<(), LendValidationError> {
    validate_date("lend_date", lend_date)?;
    if let Some(return_date) = return_date {
        validate_date("return_date", return_date)?;
    }

    match (status, return_date) {
        (LoanStatus::Returned, None) => return Err(LendValidationError::ReturnDateRequired),
        (LoanStatus::OnLoan, Some(return_date)) => {
            return Err(LendValidationError::ReturnDateNotAllowed {
                return_date: return_date.to_string(),
            });
        }
        _ => {}
    }

    if let Some(return_date) = return_date {
        // ISO dates compare correctly as strings.
        if return_date < lend_date {
            return Err(LendValidationError::ReturnBeforeLend {
                lend_date: lend_date.to_string(),
                return_date: return_date.to_string(),
            });
        }
    }

    Ok(())
}

impl NewLendRecord {
    /// Creates an outstanding-loan draft for a borrow event.
    pub fn on_loan(
        reader_id: ReaderId,
        book_id: BookId,
        lend_date: impl Into<String>,
    ) -> Self {
        Self {
            reader_id,
            book_id,
            lend_date: lend_date.into(),
            return_date: None,
            status: LoanStatus::OnLoan,
            notes: None,
        }
    }

    /// Validates dates and the status/return-date invariant.
    pub fn validate(&self) -> Result<(), LendValidationError> {
        validate_lend_fields(
            self.lend_date.as_str(),
            self.return_date.as_deref(),
            self.status,
        )
    }
}

impl LendRecord {
    /// Validates dates and the status/return-date invariant.
    pub fn validate(&self) -> Result<(), LendValidationError> {
        validate_lend_fields(
            self.lend_date.as_str(),
            self.return_date.as_deref(),
            self.status,
        )
    }

    /// Transitions this record to the returned state.
    ///
    /// Sets `return_date` and flips `status` together so the lifecycle
    /// invariant cannot be broken halfway.
    pub fn mark_returned(&mut self, return_date: impl Into<String>) {
        self.return_date = Some(return_date.into());
        self.status = LoanStatus::Returned;
    }

    /// Returns whether the book is still out.
    pub fn is_outstanding(&self) -> bool {
        self.status == LoanStatus::OnLoan
    }
}
