//! Lend/return repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD and reporting APIs over the `lend_return` ledger.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths must call record validation before SQL mutations.
//! - Read paths must reject invalid persisted state instead of masking it.
//! - Each operation is a single statement; there are no partial commits.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::lend::{
    validate_date, BookId, LendId, LendRecord, LendValidationError, LoanStatus, NewLendRecord,
    ReaderId,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const LEND_SELECT_SQL: &str = "SELECT
    id,
    r_id,
    b_id,
    lend_date,
    return_date,
    status,
    notes
FROM lend_return";

const LENDS_DEFAULT_LIMIT: u32 = 10;
const LENDS_LIMIT_MAX: u32 = 50;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for lend persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Input record or query argument failed model validation.
    Validation(LendValidationError),
    /// Underlying SQLite/bootstrap error, including constraint violations.
    Db(DbError),
    /// Target row does not exist.
    NotFound(LendId),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from an expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "lend record not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted lend data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "lend repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "lend repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "lend repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LendValidationError> for RepoError {
    fn from(value: LendValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Filter and pagination options for lend listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LendPageQuery {
    /// Restrict to one reader.
    pub reader_id: Option<ReaderId>,
    /// Restrict to one book.
    pub book_id: Option<BookId>,
    /// Restrict to one loan state.
    pub status: Option<LoanStatus>,
    /// Inclusive lower bound on `lend_date`.
    pub lend_date_from: Option<String>,
    /// Inclusive upper bound on `lend_date`.
    pub lend_date_to: Option<String>,
    /// Maximum rows to return. Defaults to 10 and clamps to 50.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// One bounded window of matching rows plus the unpaginated match count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LendPage {
    /// Rows in default order `lend_date DESC, id DESC`.
    pub items: Vec<LendRecord>,
    /// Number of rows matching the filters, ignoring limit/offset.
    pub total: u64,
}

/// Repository interface for lend/return persistence and reporting.
pub trait LendRepository {
    /// Appends one row and returns the assigned id.
    ///
    /// Referencing an unknown reader or book fails at the statement with a
    /// foreign-key constraint error.
    fn insert(&self, draft: &NewLendRecord) -> RepoResult<LendId>;
    /// Returns one bounded window of rows matching the query filters.
    fn page(&self, query: &LendPageQuery) -> RepoResult<LendPage>;
    /// Exact-match lookup by id.
    fn get(&self, id: LendId) -> RepoResult<Option<LendRecord>>;
    /// Full-row update by primary key.
    fn update(&self, record: &LendRecord) -> RepoResult<()>;
    /// Deletes all rows with the given ids in one statement.
    ///
    /// Ids without a matching row are silently ignored; returns the number
    /// of rows actually removed.
    fn delete_batch(&self, ids: &[LendId]) -> RepoResult<usize>;
    /// Distinct ids of books lent on or after `begin`, ascending.
    fn book_ids_lent_since(&self, begin: &str) -> RepoResult<Vec<BookId>>;
    /// Count of the book's lend records with `lend_date >= begin`.
    fn book_lend_count_since(&self, begin: &str, book_id: BookId) -> RepoResult<u64>;
    /// Distinct ids of readers with lend records on or after `begin`, ascending.
    fn reader_ids_lent_since(&self, begin: &str) -> RepoResult<Vec<ReaderId>>;
    /// Count of the reader's lend records with `lend_date >= begin`.
    fn reader_lend_count_since(&self, begin: &str, reader_id: ReaderId) -> RepoResult<u64>;
    /// Count of the reader's lend records with `lend_date <= last_date`,
    /// inclusive of `last_date` itself.
    fn reader_lend_count_through(&self, reader_id: ReaderId, last_date: &str) -> RepoResult<u64>;
    /// Count of still-outstanding loans whose elapsed days exceed the lend
    /// period of the borrowing reader's category.
    ///
    /// Derived point-in-time value, recomputed against the current date on
    /// every call.
    fn overdue_count(&self) -> RepoResult<u64>;
}

/// SQLite-backed lend repository.
pub struct SqliteLendRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLendRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_lend_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl LendRepository for SqliteLendRepository<'_> {
    fn insert(&self, draft: &NewLendRecord) -> RepoResult<LendId> {
        draft.validate()?;

        self.conn.execute(
            "INSERT INTO lend_return (
                r_id,
                b_id,
                lend_date,
                return_date,
                status,
                notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                draft.reader_id,
                draft.book_id,
                draft.lend_date.as_str(),
                draft.return_date.as_deref(),
                status_to_db(draft.status),
                draft.notes.as_deref(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn page(&self, query: &LendPageQuery) -> RepoResult<LendPage> {
        let mut predicate = String::from(" WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(reader_id) = query.reader_id {
            predicate.push_str(" AND r_id = ?");
            bind_values.push(Value::Integer(reader_id));
        }
        if let Some(book_id) = query.book_id {
            predicate.push_str(" AND b_id = ?");
            bind_values.push(Value::Integer(book_id));
        }
        if let Some(status) = query.status {
            predicate.push_str(" AND status = ?");
            bind_values.push(Value::Integer(status_to_db(status)));
        }
        if let Some(from) = query.lend_date_from.as_ref() {
            validate_date("lend_date_from", from)?;
            predicate.push_str(" AND lend_date >= ?");
            bind_values.push(Value::Text(from.clone()));
        }
        if let Some(to) = query.lend_date_to.as_ref() {
            validate_date("lend_date_to", to)?;
            predicate.push_str(" AND lend_date <= ?");
            bind_values.push(Value::Text(to.clone()));
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM lend_return{predicate};"),
            params_from_iter(bind_values.iter().cloned()),
            |row| row.get(0),
        )?;

        let limit = normalize_lend_limit(query.limit);
        let mut sql =
            format!("{LEND_SELECT_SQL}{predicate} ORDER BY lend_date DESC, id DESC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }
        sql.push(';');

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_lend_row(row)?);
        }

        Ok(LendPage {
            items,
            total: total as u64,
        })
    }

    fn get(&self, id: LendId) -> RepoResult<Option<LendRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LEND_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_lend_row(row)?));
        }

        Ok(None)
    }

    fn update(&self, record: &LendRecord) -> RepoResult<()> {
        record.validate()?;

        let changed = self.conn.execute(
            "UPDATE lend_return
             SET
                r_id = ?1,
                b_id = ?2,
                lend_date = ?3,
                return_date = ?4,
                status = ?5,
                notes = ?6,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?7;",
            params![
                record.reader_id,
                record.book_id,
                record.lend_date.as_str(),
                record.return_date.as_deref(),
                status_to_db(record.status),
                record.notes.as_deref(),
                record.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(record.id));
        }

        Ok(())
    }

    fn delete_batch(&self, ids: &[LendId]) -> RepoResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM lend_return WHERE id IN ({placeholders});");
        let deleted = self
            .conn
            .execute(&sql, params_from_iter(ids.iter().copied()))?;

        Ok(deleted)
    }

    fn book_ids_lent_since(&self, begin: &str) -> RepoResult<Vec<BookId>> {
        validate_date("begin", begin)?;

        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT b_id
             FROM lend_return
             WHERE lend_date >= ?1
             ORDER BY b_id ASC;",
        )?;
        collect_ids(&mut stmt, begin)
    }

    fn book_lend_count_since(&self, begin: &str, book_id: BookId) -> RepoResult<u64> {
        validate_date("begin", begin)?;

        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM lend_return
             WHERE b_id = ?1
               AND lend_date >= ?2;",
            params![book_id, begin],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn reader_ids_lent_since(&self, begin: &str) -> RepoResult<Vec<ReaderId>> {
        validate_date("begin", begin)?;

        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT r_id
             FROM lend_return
             WHERE lend_date >= ?1
             ORDER BY r_id ASC;",
        )?;
        collect_ids(&mut stmt, begin)
    }

    fn reader_lend_count_since(&self, begin: &str, reader_id: ReaderId) -> RepoResult<u64> {
        validate_date("begin", begin)?;

        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM lend_return
             WHERE r_id = ?1
               AND lend_date >= ?2;",
            params![reader_id, begin],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn reader_lend_count_through(&self, reader_id: ReaderId, last_date: &str) -> RepoResult<u64> {
        validate_date("last_date", last_date)?;

        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM lend_return
             WHERE r_id = ?1
               AND lend_date <= ?2;",
            params![reader_id, last_date],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn overdue_count(&self) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM lend_return lr
             JOIN reader r ON lr.r_id = r.id
             JOIN r_category rc ON r.category_id = rc.id
             WHERE lr.status = 0
               AND julianday(date('now')) - julianday(lr.lend_date) > rc.lend_period;",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Normalizes the listing limit according to the paging contract.
pub fn normalize_lend_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) => LENDS_DEFAULT_LIMIT,
        Some(value) if value > LENDS_LIMIT_MAX => LENDS_LIMIT_MAX,
        Some(value) => value,
        None => LENDS_DEFAULT_LIMIT,
    }
}

fn collect_ids(stmt: &mut rusqlite::Statement<'_>, begin: &str) -> RepoResult<Vec<i64>> {
    let mut rows = stmt.query([begin])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}

fn parse_lend_row(row: &Row<'_>) -> RepoResult<LendRecord> {
    let status_value: i64 = row.get("status")?;
    let status = parse_status(status_value).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status value `{status_value}` in lend_return.status"
        ))
    })?;

    let record = LendRecord {
        id: row.get("id")?,
        reader_id: row.get("r_id")?,
        book_id: row.get("b_id")?,
        lend_date: row.get("lend_date")?,
        return_date: row.get("return_date")?,
        status,
        notes: row.get("notes")?,
    };
    record.validate()?;
    Ok(record)
}

fn status_to_db(status: LoanStatus) -> i64 {
    match status {
        LoanStatus::OnLoan => 0,
        LoanStatus::Returned => 1,
    }
}

fn parse_status(value: i64) -> Option<LoanStatus> {
    match value {
        0 => Some(LoanStatus::OnLoan),
        1 => Some(LoanStatus::Returned),
        _ => None,
    }
}

fn ensure_lend_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    const REQUIRED: &[(&str, &[&str])] = &[
        (
            "lend_return",
            &[
                "id",
                "r_id",
                "b_id",
                "lend_date",
                "return_date",
                "status",
                "notes",
            ],
        ),
        ("reader", &["id", "category_id"]),
        ("r_category", &["id", "lend_period"]),
        ("book", &["id"]),
    ];

    for (table, columns) in REQUIRED.iter().copied() {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for column in columns.iter().copied() {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
