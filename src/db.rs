use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;

pub fn connect(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

/// Create the tables this worker reads from, if the platform has not already.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS "grade" (
            "id"          INTEGER PRIMARY KEY AUTOINCREMENT UNIQUE,
            "name"        TEXT NOT NULL,
            "description" TEXT
        );

        CREATE TABLE IF NOT EXISTS "course" (
            "id"          INTEGER PRIMARY KEY AUTOINCREMENT UNIQUE,
            "grade_id"    INTEGER NOT NULL,
            "name"        TEXT NOT NULL,
            "description" TEXT,
            FOREIGN KEY("grade_id") REFERENCES "grade"("id") ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS "text_class" (
            "id"             INTEGER,
            "course_id"      INTEGER NOT NULL,
            "file_name"      TEXT DEFAULT '',
            "proc_file_name" TEXT DEFAULT '',
            "title"          TEXT NOT NULL,
            FOREIGN KEY("course_id") REFERENCES "course"("id") ON DELETE CASCADE,
            PRIMARY KEY("id")
        );
        "#,
    )?;
    Ok(())
}

// ── Discovery ──

/// A text class whose raw upload has not been localized yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingDocument {
    pub class_id: i64,
    pub course_id: i64,
    pub grade_id: i64,
    pub source_path: String,
}

/// Every document with a source file and no processed file, fully buffered
/// so later writes cannot disturb the cursor.
pub fn fetch_pending(conn: &Connection) -> Result<Vec<PendingDocument>> {
    let mut stmt = conn.prepare(
        "SELECT tc.id, tc.course_id, c.grade_id, tc.file_name
         FROM text_class tc
         JOIN course c ON c.id = tc.course_id
         JOIN grade g ON g.id = c.grade_id
         WHERE COALESCE(tc.file_name, '') <> ''
           AND COALESCE(tc.proc_file_name, '') = ''
         ORDER BY tc.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PendingDocument {
                class_id: row.get(0)?,
                course_id: row.get(1)?,
                grade_id: row.get(2)?,
                source_path: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Updates ──

/// Record the processed file. Returns the number of rows touched.
pub fn mark_processed(conn: &Connection, class_id: i64, processed_path: &str) -> Result<usize> {
    let n = conn.execute(
        "UPDATE text_class SET proc_file_name = ?1 WHERE id = ?2",
        rusqlite::params![processed_path, class_id],
    )?;
    Ok(n)
}

/// Clear the processed path so the next pass picks the document up again.
pub fn requeue(conn: &Connection, class_id: i64) -> Result<usize> {
    let n = conn.execute(
        "UPDATE text_class SET proc_file_name = '' WHERE id = ?1",
        rusqlite::params![class_id],
    )?;
    Ok(n)
}

// ── Stats ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub with_source: usize,
    pub processed: usize,
    pub pending: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM text_class", [], |r| r.get(0))?;
    let with_source: usize = conn.query_row(
        "SELECT COUNT(*) FROM text_class WHERE COALESCE(file_name, '') <> ''",
        [],
        |r| r.get(0),
    )?;
    let processed: usize = conn.query_row(
        "SELECT COUNT(*) FROM text_class WHERE COALESCE(proc_file_name, '') <> ''",
        [],
        |r| r.get(0),
    )?;
    let pending = fetch_pending(conn)?.len();
    Ok(Stats {
        total,
        with_source,
        processed,
        pending,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_db, seed_class};

    #[test]
    fn pending_requires_source_and_no_processed_file() {
        let conn = memory_db();
        seed_class(&conn, 1, 2, 5, "sync/1/2/5/file.md", "");
        seed_class(&conn, 1, 2, 6, "", "");
        seed_class(&conn, 1, 2, 7, "sync/1/2/7/done.md", "sync/1/2/7/processed_done.md");
        seed_class(&conn, 3, 4, 8, "sync/3/4/8/other.md", "");

        let pending = fetch_pending(&conn).unwrap();
        assert_eq!(
            pending,
            vec![
                PendingDocument {
                    class_id: 5,
                    course_id: 2,
                    grade_id: 1,
                    source_path: "sync/1/2/5/file.md".into(),
                },
                PendingDocument {
                    class_id: 8,
                    course_id: 4,
                    grade_id: 3,
                    source_path: "sync/3/4/8/other.md".into(),
                },
            ]
        );
    }

    #[test]
    fn null_columns_count_as_empty() {
        let conn = memory_db();
        seed_class(&conn, 1, 1, 1, "sync/1/1/1/a.md", "");
        seed_class(&conn, 1, 1, 2, "sync/1/1/2/b.md", "");
        conn.execute("UPDATE text_class SET proc_file_name = NULL WHERE id = 1", [])
            .unwrap();
        conn.execute("UPDATE text_class SET file_name = NULL WHERE id = 2", [])
            .unwrap();

        let ids: Vec<i64> = fetch_pending(&conn).unwrap().iter().map(|d| d.class_id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn mark_processed_then_requeue() {
        let conn = memory_db();
        seed_class(&conn, 1, 2, 5, "sync/1/2/5/file.md", "");

        assert_eq!(mark_processed(&conn, 5, "sync/1/2/5/processed_file.md").unwrap(), 1);
        assert!(fetch_pending(&conn).unwrap().is_empty());
        assert_eq!(mark_processed(&conn, 99, "nowhere").unwrap(), 0);

        assert_eq!(requeue(&conn, 5).unwrap(), 1);
        assert_eq!(fetch_pending(&conn).unwrap().len(), 1);
    }

    #[test]
    fn stats_counts() {
        let conn = memory_db();
        seed_class(&conn, 1, 2, 5, "sync/1/2/5/file.md", "");
        seed_class(&conn, 1, 2, 6, "", "");
        seed_class(&conn, 1, 2, 7, "sync/1/2/7/done.md", "sync/1/2/7/processed_done.md");

        let s = get_stats(&conn).unwrap();
        assert_eq!(
            s,
            Stats {
                total: 3,
                with_source: 2,
                processed: 1,
                pending: 1,
            }
        );
    }

    #[test]
    fn init_schema_is_idempotent() {
        let conn = memory_db();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }
}
