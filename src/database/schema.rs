// Database schema definitions and migrations
// Statements run in order by `Database::run_migrations`

pub const RECORDS_SCHEMA: &str = include_str!("../../migrations/001_records.sql");

pub const MIGRATIONS: &[&str] = &[RECORDS_SCHEMA];
