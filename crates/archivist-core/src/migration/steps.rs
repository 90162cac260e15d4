use rusqlite::{params, Connection, Result};

use super::{MigrationStep, SchemaVersion};

const CORE_CATALOG_SQL: &str = "
CREATE TABLE IF NOT EXISTS locations (
    id          TEXT PRIMARY KEY,
    short_id    TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    region      TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sub_locations (
    id          TEXT PRIMARY KEY,
    short_id    TEXT NOT NULL UNIQUE,
    location_id TEXT NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sub_locations_location ON sub_locations(location_id);

CREATE TABLE IF NOT EXISTS archive_urls (
    id          TEXT PRIMARY KEY,
    short_id    TEXT NOT NULL UNIQUE,
    location_id TEXT NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
    url         TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS images (
    content_hash      TEXT PRIMARY KEY,
    location_id       TEXT NOT NULL REFERENCES locations(id) ON DELETE RESTRICT,
    sub_location_id   TEXT REFERENCES sub_locations(id) ON DELETE RESTRICT,
    batch_id          TEXT,
    archive_path      TEXT NOT NULL UNIQUE,
    original_filename TEXT NOT NULL,
    extension         TEXT NOT NULL,
    size_bytes        INTEGER NOT NULL,
    imported_at       TEXT NOT NULL,
    width             INTEGER,
    height            INTEGER,
    captured_at       TEXT,
    camera_make       TEXT,
    camera_model      TEXT
);
CREATE INDEX IF NOT EXISTS idx_images_location ON images(location_id);
CREATE INDEX IF NOT EXISTS idx_images_batch ON images(batch_id);

CREATE TABLE IF NOT EXISTS videos (
    content_hash      TEXT PRIMARY KEY,
    location_id       TEXT NOT NULL REFERENCES locations(id) ON DELETE RESTRICT,
    sub_location_id   TEXT REFERENCES sub_locations(id) ON DELETE RESTRICT,
    batch_id          TEXT,
    archive_path      TEXT NOT NULL UNIQUE,
    original_filename TEXT NOT NULL,
    extension         TEXT NOT NULL,
    size_bytes        INTEGER NOT NULL,
    imported_at       TEXT NOT NULL,
    duration_secs     REAL,
    codec             TEXT,
    frame_rate        REAL,
    width             INTEGER,
    height            INTEGER,
    captured_at       TEXT,
    camera_make       TEXT,
    camera_model      TEXT
);
CREATE INDEX IF NOT EXISTS idx_videos_location ON videos(location_id);
CREATE INDEX IF NOT EXISTS idx_videos_batch ON videos(batch_id);

CREATE TABLE IF NOT EXISTS documents (
    content_hash      TEXT PRIMARY KEY,
    location_id       TEXT NOT NULL REFERENCES locations(id) ON DELETE RESTRICT,
    sub_location_id   TEXT REFERENCES sub_locations(id) ON DELETE RESTRICT,
    batch_id          TEXT,
    archive_path      TEXT NOT NULL UNIQUE,
    original_filename TEXT NOT NULL,
    extension         TEXT NOT NULL,
    size_bytes        INTEGER NOT NULL,
    imported_at       TEXT NOT NULL,
    mime_type         TEXT
);
CREATE INDEX IF NOT EXISTS idx_documents_location ON documents(location_id);
CREATE INDEX IF NOT EXISTS idx_documents_batch ON documents(batch_id);
";

const STAGING_SQL: &str = "
CREATE TABLE IF NOT EXISTS import_batches (
    id              TEXT PRIMARY KEY,
    location_id     TEXT NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
    sub_location_id TEXT,
    started_at      TEXT NOT NULL,
    completed_at    TEXT,
    status          TEXT NOT NULL DEFAULT 'running',
    total_files     INTEGER NOT NULL DEFAULT 0,
    imported        INTEGER NOT NULL DEFAULT 0,
    duplicates      INTEGER NOT NULL DEFAULT 0,
    skipped         INTEGER NOT NULL DEFAULT 0,
    failed          INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS staging_records (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    batch_id      TEXT NOT NULL REFERENCES import_batches(id) ON DELETE CASCADE,
    content_hash  TEXT NOT NULL,
    source_path   TEXT NOT NULL,
    category      TEXT NOT NULL,
    size_bytes    INTEGER NOT NULL,
    discovered_at TEXT NOT NULL,
    status        TEXT NOT NULL,
    reason        TEXT,
    warnings      TEXT
);
CREATE INDEX IF NOT EXISTS idx_staging_batch ON staging_records(batch_id);
CREATE INDEX IF NOT EXISTS idx_staging_hash ON staging_records(content_hash);
";

/// Triggers stand in for foreign keys: a link can point at any of the three asset tables.
const ASSET_LINKS_SQL: &str = "
CREATE TABLE IF NOT EXISTS asset_links (
    category_a TEXT NOT NULL,
    hash_a     TEXT NOT NULL,
    category_b TEXT NOT NULL,
    hash_b     TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (category_a, hash_a, category_b, hash_b),
    CHECK (category_a <> category_b OR hash_a <> hash_b)
);
CREATE INDEX IF NOT EXISTS idx_asset_links_b ON asset_links(category_b, hash_b);

CREATE TRIGGER IF NOT EXISTS trg_images_unlink AFTER DELETE ON images BEGIN
    DELETE FROM asset_links
     WHERE (category_a = 'image' AND hash_a = OLD.content_hash)
        OR (category_b = 'image' AND hash_b = OLD.content_hash);
END;
CREATE TRIGGER IF NOT EXISTS trg_videos_unlink AFTER DELETE ON videos BEGIN
    DELETE FROM asset_links
     WHERE (category_a = 'video' AND hash_a = OLD.content_hash)
        OR (category_b = 'video' AND hash_b = OLD.content_hash);
END;
CREATE TRIGGER IF NOT EXISTS trg_documents_unlink AFTER DELETE ON documents BEGIN
    DELETE FROM asset_links
     WHERE (category_a = 'document' AND hash_a = OLD.content_hash)
        OR (category_b = 'document' AND hash_b = OLD.content_hash);
END;
";

const TOMBSTONES_SQL: &str = "
CREATE TABLE IF NOT EXISTS asset_tombstones (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    category     TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    archive_path TEXT NOT NULL,
    location_id  TEXT NOT NULL,
    trash_path   TEXT,
    removed_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tombstones_hash ON asset_tombstones(content_hash);
";

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2)",
        params![table, column],
        |row| row.get(0),
    )
}

fn add_hardware_class(conn: &Connection) -> Result<()> {
    for table in ["images", "videos"] {
        if !column_exists(conn, table, "hardware_class")? {
            conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN hardware_class TEXT;"))?;
        }
        conn.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_hardware ON {table}(hardware_class);"
        ))?;
    }
    Ok(())
}

/// The shipped chain, oldest first.
pub fn migration_chain() -> Vec<MigrationStep> {
    vec![
        MigrationStep {
            version: SchemaVersion::new(0, 1, 0),
            description: "Core catalog: locations, sub-locations, archive URLs and asset tables",
            sql: CORE_CATALOG_SQL,
            transform: None,
        },
        MigrationStep {
            version: SchemaVersion::new(0, 1, 1),
            description: "Import batches and staging records",
            sql: STAGING_SQL,
            transform: None,
        },
        MigrationStep {
            version: SchemaVersion::new(0, 1, 2),
            description: "Hardware class on images and videos",
            sql: "",
            transform: Some(add_hardware_class),
        },
        MigrationStep {
            version: SchemaVersion::new(0, 1, 3),
            description: "Asset links join table",
            sql: ASSET_LINKS_SQL,
            transform: None,
        },
        MigrationStep {
            version: SchemaVersion::new(0, 1, 4),
            description: "Asset tombstones",
            sql: TOMBSTONES_SQL,
            transform: None,
        },
    ]
}

pub fn latest_version() -> SchemaVersion {
    SchemaVersion::new(0, 1, 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_is_strictly_ordered() {
        let chain = migration_chain();
        assert!(chain.windows(2).all(|w| w[0].version < w[1].version));
        assert_eq!(chain.last().map(|s| s.version), Some(latest_version()));
    }

    #[test]
    fn test_every_step_is_rerunnable() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        for step in migration_chain() {
            step.apply(&conn).unwrap();
            step.apply(&conn).unwrap();
        }
        assert!(column_exists(&conn, "images", "hardware_class").unwrap());
        assert!(column_exists(&conn, "videos", "hardware_class").unwrap());
        assert!(!column_exists(&conn, "documents", "hardware_class").unwrap());
    }

    #[test]
    fn test_link_rows_follow_asset_deletion() {
        let conn = Connection::open_in_memory().unwrap();
        for step in migration_chain() {
            step.apply(&conn).unwrap();
        }
        conn.execute_batch(
            "INSERT INTO locations VALUES ('loc', 'aaaaaaaa', 'Mill', NULL, 'now');
             INSERT INTO images (content_hash, location_id, archive_path, original_filename,
                                 extension, size_bytes, imported_at)
                  VALUES ('h1', 'loc', 'a/1.jpg', '1.jpg', 'jpg', 1, 'now');
             INSERT INTO documents (content_hash, location_id, archive_path, original_filename,
                                    extension, size_bytes, imported_at)
                  VALUES ('h2', 'loc', 'a/2.pdf', '2.pdf', 'pdf', 1, 'now');
             INSERT INTO asset_links VALUES ('document', 'h2', 'image', 'h1', 'now');
             DELETE FROM images WHERE content_hash = 'h1';",
        )
        .unwrap();
        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM asset_links", [], |row| row.get(0))
            .unwrap();
        assert_eq!(links, 0);
    }
}
