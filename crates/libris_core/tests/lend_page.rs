use libris_core::db::open_db_in_memory;
use libris_core::repo::lend_repo::normalize_lend_limit;
use libris_core::{
    LendPageQuery, LendRepository, LoanStatus, NewLendRecord, RepoError, SqliteLendRepository,
};
use rusqlite::Connection;

fn seed_library(conn: &Connection) {
    conn.execute_batch(
        "INSERT INTO r_category (id, name, lend_period) VALUES (1, 'standard', 30);
         INSERT INTO reader (id, category_id, name) VALUES (1, 1, 'reader one');
         INSERT INTO reader (id, category_id, name) VALUES (2, 1, 'reader two');
         INSERT INTO book (id, title) VALUES (1, 'book one');
         INSERT INTO book (id, title) VALUES (2, 'book two');",
    )
    .unwrap();
}

/// Four records: three for reader 1 (one already returned), one for reader 2.
fn seed_lends(repo: &SqliteLendRepository<'_>) -> Vec<i64> {
    let mut returned = NewLendRecord::on_loan(1, 1, "2026-01-10");
    returned.status = LoanStatus::Returned;
    returned.return_date = Some("2026-01-25".to_string());

    vec![
        repo.insert(&returned).unwrap(),
        repo.insert(&NewLendRecord::on_loan(1, 2, "2026-02-05")).unwrap(),
        repo.insert(&NewLendRecord::on_loan(2, 2, "2026-02-20")).unwrap(),
        repo.insert(&NewLendRecord::on_loan(1, 1, "2026-03-01")).unwrap(),
    ]
}

#[test]
fn page_returns_newest_first_with_total() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();
    seed_lends(&repo);

    let page = repo.page(&LendPageQuery::default()).unwrap();

    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 4);
    let dates: Vec<&str> = page.items.iter().map(|r| r.lend_date.as_str()).collect();
    assert_eq!(
        dates,
        vec!["2026-03-01", "2026-02-20", "2026-02-05", "2026-01-10"]
    );
}

#[test]
fn page_window_is_bounded_and_total_ignores_pagination() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();
    seed_lends(&repo);

    let query = LendPageQuery {
        limit: Some(2),
        ..LendPageQuery::default()
    };
    let first = repo.page(&query).unwrap();
    assert_eq!(first.total, 4);
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.items[0].lend_date, "2026-03-01");
    assert_eq!(first.items[1].lend_date, "2026-02-20");

    let query = LendPageQuery {
        limit: Some(2),
        offset: 2,
        ..LendPageQuery::default()
    };
    let second = repo.page(&query).unwrap();
    assert_eq!(second.total, 4);
    assert_eq!(second.items.len(), 2);
    assert_eq!(second.items[0].lend_date, "2026-02-05");
    assert_eq!(second.items[1].lend_date, "2026-01-10");
}

#[test]
fn page_filters_by_reader_book_and_status() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();
    seed_lends(&repo);

    let by_reader = repo
        .page(&LendPageQuery {
            reader_id: Some(1),
            ..LendPageQuery::default()
        })
        .unwrap();
    assert_eq!(by_reader.total, 3);
    assert!(by_reader.items.iter().all(|r| r.reader_id == 1));

    let by_book = repo
        .page(&LendPageQuery {
            book_id: Some(2),
            ..LendPageQuery::default()
        })
        .unwrap();
    assert_eq!(by_book.total, 2);
    assert!(by_book.items.iter().all(|r| r.book_id == 2));

    let outstanding = repo
        .page(&LendPageQuery {
            status: Some(LoanStatus::OnLoan),
            ..LendPageQuery::default()
        })
        .unwrap();
    assert_eq!(outstanding.total, 3);
    assert!(outstanding.items.iter().all(|r| r.is_outstanding()));
}

#[test]
fn page_filters_by_inclusive_lend_date_range() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();
    seed_lends(&repo);

    let query = LendPageQuery {
        lend_date_from: Some("2026-02-05".to_string()),
        lend_date_to: Some("2026-02-20".to_string()),
        ..LendPageQuery::default()
    };
    let page = repo.page(&query).unwrap();

    assert_eq!(page.total, 2);
    let dates: Vec<&str> = page.items.iter().map(|r| r.lend_date.as_str()).collect();
    assert_eq!(dates, vec!["2026-02-20", "2026-02-05"]);
}

#[test]
fn page_orders_same_day_records_by_descending_id() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();

    let first = repo.insert(&NewLendRecord::on_loan(1, 1, "2026-03-01")).unwrap();
    let second = repo.insert(&NewLendRecord::on_loan(2, 2, "2026-03-01")).unwrap();

    let page = repo.page(&LendPageQuery::default()).unwrap();
    assert_eq!(page.items[0].id, second);
    assert_eq!(page.items[1].id, first);
}

#[test]
fn page_rejects_malformed_date_bounds() {
    let conn = open_db_in_memory().unwrap();
    seed_library(&conn);
    let repo = SqliteLendRepository::try_new(&conn).unwrap();

    let query = LendPageQuery {
        lend_date_from: Some("last tuesday".to_string()),
        ..LendPageQuery::default()
    };
    let err = repo.page(&query).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}

#[test]
fn limit_normalization_defaults_and_clamps() {
    assert_eq!(normalize_lend_limit(None), 10);
    assert_eq!(normalize_lend_limit(Some(0)), 10);
    assert_eq!(normalize_lend_limit(Some(25)), 25);
    assert_eq!(normalize_lend_limit(Some(500)), 50);
}
