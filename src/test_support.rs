use crate::db;
use rusqlite::Connection;

pub const SEED_SQL: &str = include_str!("../tests/fixtures/academics_seed.sql");

pub fn seeded_conn() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    db::init_schema(&conn).expect("init schema");
    conn.execute_batch(SEED_SQL).expect("seed");
    conn
}
