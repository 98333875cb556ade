use anyhow::Result;
use rusqlite::OptionalExtension;
use rusqlite::Row;

use crate::Database;
use crate::models::{ItemRow, VersionFields};

const ITEM_COLUMNS: &str = "i.id, i.room_code, i.created_at, v.version, v.deleted, v.kind, \
     v.inline_body, v.blob_key, v.filename, v.mime_type, v.size_bytes, v.page_count, v.recorded_at";

fn map_item_row(row: &Row<'_>) -> rusqlite::Result<ItemRow> {
    Ok(ItemRow {
        id: row.get(0)?,
        room_code: row.get(1)?,
        created_at: row.get(2)?,
        version: row.get(3)?,
        deleted: row.get(4)?,
        kind: row.get(5)?,
        inline_body: row.get(6)?,
        blob_key: row.get(7)?,
        filename: row.get(8)?,
        mime_type: row.get(9)?,
        size_bytes: row.get(10)?,
        page_count: row.get(11)?,
        recorded_at: row.get(12)?,
    })
}

impl Database {
    /// Insert a new item and its version-1 row, refusing once the room
    /// already holds `limit` visible items. The count runs inside the same
    /// transaction as the inserts, so concurrent writers cannot overshoot
    /// the ceiling, and a failure between the two inserts rolls both back.
    /// Returns false (nothing inserted) on a full room. Metadata only — the
    /// caller has already committed any blob bytes this row references.
    pub fn insert_item(
        &self,
        id: &str,
        room_code: &str,
        created_at: &str,
        fields: &VersionFields,
        limit: usize,
    ) -> Result<bool> {
        self.write(|conn| {
            let tx = conn.unchecked_transaction()?;
            if count_visible(&tx, room_code)? >= limit {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO items (id, room_code, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, room_code, created_at],
            )?;
            insert_version_row(&tx, id, 1, fields, created_at)?;
            tx.commit()?;
            Ok(true)
        })
    }

    /// Append a version row for an existing item. Returns the new version
    /// number, or None if the item does not exist.
    pub fn append_version(
        &self,
        item_id: &str,
        fields: &VersionFields,
        recorded_at: &str,
    ) -> Result<Option<i64>> {
        self.write(|conn| {
            // MAX over an empty set yields a single NULL row.
            let latest: Option<i64> = conn.query_row(
                "SELECT MAX(version) FROM item_versions WHERE item_id = ?1",
                [item_id],
                |r| r.get::<_, Option<i64>>(0),
            )?;

            let Some(latest) = latest else {
                return Ok(None);
            };
            let next = latest + 1;
            insert_version_row(conn, item_id, next, fields, recorded_at)?;
            Ok(Some(next))
        })
    }

    /// Latest version of one item, deleted or not.
    pub fn get_item_latest(&self, item_id: &str) -> Result<Option<ItemRow>> {
        self.read(|conn| {
            let sql = format!(
                "SELECT {ITEM_COLUMNS} FROM items i
                 JOIN item_versions v ON v.item_id = i.id
                 WHERE i.id = ?1
                   AND v.version = (SELECT MAX(version) FROM item_versions WHERE item_id = i.id)"
            );
            let row = conn
                .prepare(&sql)?
                .query_row([item_id], map_item_row)
                .optional()?;
            Ok(row)
        })
    }

    /// Non-deleted latest-version items of a room, ordered by
    /// (created_at, id) ascending. The id tie-break makes the order total
    /// even for items created in the same millisecond.
    pub fn list_visible(&self, room_code: &str) -> Result<Vec<ItemRow>> {
        self.read(|conn| {
            let sql = format!(
                "SELECT {ITEM_COLUMNS} FROM items i
                 JOIN item_versions v ON v.item_id = i.id
                 WHERE i.room_code = ?1
                   AND v.version = (SELECT MAX(version) FROM item_versions WHERE item_id = i.id)
                   AND v.deleted = 0
                 ORDER BY i.created_at ASC, i.id ASC"
            );
            let rows = conn
                .prepare(&sql)?
                .query_map([room_code], map_item_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn visible_count(&self, room_code: &str) -> Result<usize> {
        self.read(|conn| count_visible(conn, room_code))
    }

    /// Timeline as it stood at `at`: for each item created by then, the
    /// latest version recorded by then, skipping ones deleted at that point.
    pub fn history_as_of(&self, room_code: &str, at: &str) -> Result<Vec<ItemRow>> {
        self.read(|conn| {
            let sql = format!(
                "SELECT {ITEM_COLUMNS} FROM items i
                 JOIN item_versions v ON v.item_id = i.id
                 WHERE i.room_code = ?1
                   AND i.created_at <= ?2
                   AND v.version = (SELECT MAX(version) FROM item_versions
                                    WHERE item_id = i.id AND recorded_at <= ?2)
                   AND v.deleted = 0
                 ORDER BY i.created_at ASC, i.id ASC"
            );
            let rows = conn
                .prepare(&sql)?
                .query_map(rusqlite::params![room_code, at], map_item_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every blob key referenced by any version row, across all rooms.
    /// Reconciliation diffs this against what the blob store actually holds.
    pub fn all_blob_keys(&self) -> Result<Vec<String>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT blob_key FROM item_versions WHERE blob_key IS NOT NULL",
            )?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(keys)
        })
    }
}

fn count_visible(conn: &rusqlite::Connection, room_code: &str) -> Result<usize> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM items i
         JOIN item_versions v ON v.item_id = i.id
         WHERE i.room_code = ?1
           AND v.version = (SELECT MAX(version) FROM item_versions WHERE item_id = i.id)
           AND v.deleted = 0",
        [room_code],
        |r| r.get(0),
    )?;
    Ok(n as usize)
}

fn insert_version_row(
    conn: &rusqlite::Connection,
    item_id: &str,
    version: i64,
    fields: &VersionFields,
    recorded_at: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO item_versions
             (item_id, version, deleted, kind, inline_body, blob_key,
              filename, mime_type, size_bytes, page_count, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            item_id,
            version,
            fields.deleted,
            &fields.kind,
            &fields.inline_body,
            &fields.blob_key,
            &fields.filename,
            &fields.mime_type,
            fields.size_bytes,
            &fields.page_count,
            recorded_at,
        ],
    )?;
    Ok(())
}
