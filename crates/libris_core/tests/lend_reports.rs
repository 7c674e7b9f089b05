use libris_core::db::open_db_in_memory;
use libris_core::{
    LendRepository, LoanStatus, NewLendRecord, RepoError, SqliteLendRepository,
};
use rusqlite::Connection;

/// Two categories with different lend periods, one reader in each.
fn seed_library(conn: &Connection) {
    conn.execute_batch(
        "INSERT INTO r_category (id, name, lend_period) VALUES (1, 'standard', 30);
         INSERT INTO r_category (id, name, lend_period) VALUES (2, 'short term', 10);
         INSERT INTO reader (id, category_id, name) VALUES (1, 1, 'reader one');
         INSERT INTO reader (id, category_id, name) VALUES (2, 2, 'reader two');
         INSERT INTO book (id, title) VALUES (1, 'book one');
         INSERT INTO book (id, title) VALUES (2, 'book two');
         INSERT INTO book (id, title) VALUES (3, 'book three');",
    )
    .unwrap();
}

/// Resolves a calendar date `days` away from today through SQLite itself, so
/// overdue fixtures track the same clock the query uses.
fn date_offset(conn: &Connection, days: i64) -> String {
    conn.query_row(
        "SELECT date('now', ?1 || ' days');",
        [days.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

fn insert_on_loan(repo: &SqliteLendRepository<'_>, reader_id: i64, book_id: i64, lend_date: &str) {
    repo.insert(&NewLendRecord::on_loan(reader_id, book_id, lend_date))
        .unwrap();
}

#[test]
fn overdue_count_applies_category_lend_period() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();

    // Reader 1 (30-day period): 31 days out is overdue, 29 is not.
    insert_on_loan(&repo, 1, 1, &date_offset(&conn, -31));
    insert_on_loan(&repo, 1, 2, &date_offset(&conn, -29));
    // Reader 2 (10-day period): 11 days out is overdue, 9 is not.
    insert_on_loan(&repo, 2, 1, &date_offset(&conn, -11));
    insert_on_loan(&repo, 2, 3, &date_offset(&conn, -9));

    assert_eq!(repo.overdue_count().unwrap(), 2);
}

#[test]
fn overdue_count_excludes_returned_loans() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();

    let mut returned = NewLendRecord::on_loan(1, 1, date_offset(&conn, -40));
    returned.status = LoanStatus::Returned;
    returned.return_date = Some(date_offset(&conn, -35));
    repo.insert(&returned).unwrap();

    assert_eq!(repo.overdue_count().unwrap(), 0);
}

#[test]
fn overdue_boundary_is_exclusive_at_exact_lend_period() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();

    // Exactly 30 elapsed days equals the period and is still on time.
    insert_on_loan(&repo, 1, 1, &date_offset(&conn, -30));
    assert_eq!(repo.overdue_count().unwrap(), 0);

    insert_on_loan(&repo, 1, 2, &date_offset(&conn, -31));
    assert_eq!(repo.overdue_count().unwrap(), 1);
}

#[test]
fn reader_lend_count_since_uses_inclusive_lower_bound() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();

    insert_on_loan(&repo, 1, 1, "2026-01-05");
    insert_on_loan(&repo, 1, 2, "2026-02-10");
    insert_on_loan(&repo, 1, 3, "2026-03-15");
    insert_on_loan(&repo, 2, 1, "2026-02-10");

    assert_eq!(repo.reader_lend_count_since("2026-02-01", 1).unwrap(), 2);
    assert_eq!(repo.reader_lend_count_since("2026-02-10", 1).unwrap(), 2);
    assert_eq!(repo.reader_lend_count_since("2026-04-01", 1).unwrap(), 0);
    assert_eq!(repo.reader_lend_count_since("2026-01-01", 2).unwrap(), 1);
}

#[test]
fn reader_lend_count_through_includes_reference_date() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();

    insert_on_loan(&repo, 1, 1, "2026-01-05");
    insert_on_loan(&repo, 1, 2, "2026-02-10");
    insert_on_loan(&repo, 1, 3, "2026-03-15");

    assert_eq!(repo.reader_lend_count_through(1, "2026-02-10").unwrap(), 2);
    assert_eq!(repo.reader_lend_count_through(1, "2026-02-09").unwrap(), 1);
    assert_eq!(repo.reader_lend_count_through(1, "2026-12-31").unwrap(), 3);
}

#[test]
fn id_lists_are_distinct_and_ascending() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();

    insert_on_loan(&repo, 1, 2, "2026-02-01");
    insert_on_loan(&repo, 1, 2, "2026-02-15");
    insert_on_loan(&repo, 2, 1, "2026-02-20");
    insert_on_loan(&repo, 1, 3, "2025-12-01");

    assert_eq!(repo.book_ids_lent_since("2026-01-01").unwrap(), vec![1, 2]);
    assert_eq!(repo.reader_ids_lent_since("2026-01-01").unwrap(), vec![1, 2]);
}

#[test]
fn book_lend_count_since_counts_single_book() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();

    insert_on_loan(&repo, 1, 2, "2026-02-01");
    insert_on_loan(&repo, 2, 2, "2026-02-15");
    insert_on_loan(&repo, 1, 1, "2026-02-20");

    assert_eq!(repo.book_lend_count_since("2026-01-01", 2).unwrap(), 2);
    assert_eq!(repo.book_lend_count_since("2026-02-10", 2).unwrap(), 1);
    assert_eq!(repo.book_lend_count_since("2026-01-01", 3).unwrap(), 0);
}

#[test]
fn reporting_queries_reject_malformed_dates() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();

    let err = repo.book_ids_lent_since("soon").unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));

    let err = repo.reader_lend_count_through(1, "2026/02/10").unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}
