use std::path::Path;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, ToSql};
use tracing::info;

use crate::config::ModuleSource;
use crate::error::PersistenceError;

pub type Result<T, E = PersistenceError> = std::result::Result<T, E>;

/// One accepted lesson, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonRecord {
    pub topic: String,
    pub module_id: i64,
    pub teacher: String,
    pub date: String,
    pub city: String,
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveCounts {
    pub new: usize,
    pub existing: usize,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Store { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Store { conn })
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS modules (
                id   INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                url  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cities (
                id   INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS teachers (
                id   INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS topics (
                id        INTEGER PRIMARY KEY,
                module_id INTEGER NOT NULL REFERENCES modules(id),
                title     TEXT NOT NULL,
                UNIQUE(module_id, title)
            );

            CREATE TABLE IF NOT EXISTS lessons (
                id         INTEGER PRIMARY KEY,
                topic_id   INTEGER NOT NULL REFERENCES topics(id),
                city_id    INTEGER NOT NULL REFERENCES cities(id),
                teacher_id INTEGER NOT NULL REFERENCES teachers(id),
                date       TEXT NOT NULL,
                group_name TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(topic_id, city_id, date)
            );
            CREATE INDEX IF NOT EXISTS idx_lessons_date ON lessons(date);
            ",
        )?;
        Ok(())
    }

    /// Insert configured modules with ids 1..=n. Existing rows are kept as is.
    pub fn seed_modules(&self, modules: &[ModuleSource]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO modules (id, name, url) VALUES (?1, ?2, ?3)")?;
            for (i, m) in modules.iter().enumerate() {
                count += stmt.execute(params![i as i64 + 1, m.name, m.url])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    pub fn seed_cities(&self, cities: &[String]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO cities (name) VALUES (?1)")?;
            for name in cities {
                count += stmt.execute(params![name])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    /// Write a whole collection run in one transaction. Lessons whose
    /// (topic, city, date) is already stored are counted and left untouched.
    /// Any failure rolls back every row of the batch.
    pub fn save_lessons(&self, records: &[LessonRecord]) -> Result<SaveCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let mut counts = SaveCounts::default();

        for r in records {
            let city_id = city_id(&tx, &r.city)?;
            let teacher_id = teacher_id(&tx, &r.teacher)?;
            let topic_id = topic_id(&tx, r.module_id, &r.topic)?;

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM lessons WHERE topic_id = ?1 AND city_id = ?2 AND date = ?3",
                    params![topic_id, city_id, r.date],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                counts.existing += 1;
                continue;
            }

            tx.execute(
                "INSERT INTO lessons (topic_id, city_id, teacher_id, date, group_name)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![topic_id, city_id, teacher_id, r.date, r.group_name],
            )?;
            counts.new += 1;
        }

        tx.commit()?;
        info!(
            "Saved to database: {} new lessons, {} already existing",
            counts.new, counts.existing
        );
        Ok(counts)
    }

    pub fn stats(&self) -> Result<Stats> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
            Ok(n as usize)
        };
        Ok(Stats {
            modules: count("modules")?,
            cities: count("cities")?,
            teachers: count("teachers")?,
            topics: count("topics")?,
            lessons: count("lessons")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub modules: usize,
    pub cities: usize,
    pub teachers: usize,
    pub topics: usize,
    pub lessons: usize,
}

pub fn city_id(conn: &Connection, name: &str) -> Result<i64> {
    get_or_create(
        conn,
        "SELECT id FROM cities WHERE name = ?1",
        "INSERT INTO cities (name) VALUES (?1)",
        params![name],
    )
}

pub fn teacher_id(conn: &Connection, name: &str) -> Result<i64> {
    get_or_create(
        conn,
        "SELECT id FROM teachers WHERE name = ?1",
        "INSERT INTO teachers (name) VALUES (?1)",
        params![name],
    )
}

pub fn topic_id(conn: &Connection, module_id: i64, title: &str) -> Result<i64> {
    get_or_create(
        conn,
        "SELECT id FROM topics WHERE module_id = ?1 AND title = ?2",
        "INSERT INTO topics (module_id, title) VALUES (?1, ?2)",
        params![module_id, title],
    )
}

/// Lookup, insert on miss.
fn get_or_create(
    conn: &Connection,
    select_sql: &str,
    insert_sql: &str,
    key: &[&dyn ToSql],
) -> Result<i64> {
    if let Some(id) = lookup(conn, select_sql, key)? {
        return Ok(id);
    }
    insert_or_lookup(conn, select_sql, insert_sql, key)
}

/// Insert a dimension row. If another writer got there first the unique
/// constraint fires and the existing row is looked up instead.
fn insert_or_lookup(
    conn: &Connection,
    select_sql: &str,
    insert_sql: &str,
    key: &[&dyn ToSql],
) -> Result<i64> {
    match conn.execute(insert_sql, key) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => match lookup(conn, select_sql, key)? {
            Some(id) => Ok(id),
            None => Err(e.into()),
        },
        Err(e) => Err(e.into()),
    }
}

fn lookup(conn: &Connection, select_sql: &str, key: &[&dyn ToSql]) -> Result<Option<i64>> {
    Ok(conn
        .query_row(select_sql, key, |row| row.get::<_, i64>(0))
        .optional()?)
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == ErrorCode::ConstraintViolation
                && f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
