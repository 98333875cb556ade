use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE rooms (
                code        TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL,
                expires_at  TEXT,
                is_pinned   INTEGER NOT NULL DEFAULT 0,
                access_mode TEXT NOT NULL DEFAULT 'full_access'
            );

            CREATE INDEX idx_rooms_expiry ON rooms(expires_at) WHERE is_pinned = 0;

            CREATE TABLE items (
                id          TEXT PRIMARY KEY,
                room_code   TEXT NOT NULL REFERENCES rooms(code) ON DELETE CASCADE,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_items_room ON items(room_code, created_at);

            CREATE TABLE item_versions (
                item_id     TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
                version     INTEGER NOT NULL,
                deleted     INTEGER NOT NULL DEFAULT 0,
                kind        TEXT NOT NULL,
                inline_body TEXT,
                blob_key    TEXT,
                filename    TEXT,
                mime_type   TEXT,
                size_bytes  INTEGER NOT NULL DEFAULT 0,
                page_count  INTEGER,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (item_id, version)
            );

            CREATE INDEX idx_versions_blob ON item_versions(blob_key)
                WHERE blob_key IS NOT NULL;

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
