//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `libris_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use libris_core::db::migrations::latest_version;
use libris_core::db::open_db_in_memory;

fn main() {
    println!("libris_core version={}", libris_core::core_version());
    println!("libris_core schema_version={}", latest_version());

    match open_db_in_memory() {
        Ok(_) => println!("libris_core bootstrap=ok"),
        Err(err) => {
            eprintln!("libris_core bootstrap=error {err}");
            std::process::exit(1);
        }
    }
}
