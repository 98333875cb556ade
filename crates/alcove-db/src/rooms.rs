use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::Database;
use crate::models::RoomRow;

impl Database {
    /// Insert a room. Returns false if the code is already taken — the
    /// registry retries with a fresh draw rather than overwriting.
    pub fn insert_room(&self, room: &RoomRow) -> Result<bool> {
        self.write(|conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO rooms (code, created_at, expires_at, is_pinned, access_mode)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    &room.code,
                    &room.created_at,
                    &room.expires_at,
                    room.is_pinned,
                    &room.access_mode,
                ],
            )?;
            Ok(n == 1)
        })
    }

    pub fn get_room(&self, code: &str) -> Result<Option<RoomRow>> {
        self.read(|conn| query_room(conn, code))
    }

    /// Returns affected row count — 0 means no such room.
    pub fn set_access_mode(&self, code: &str, mode: &str) -> Result<usize> {
        self.write(|conn| {
            let n = conn.execute(
                "UPDATE rooms SET access_mode = ?2 WHERE code = ?1",
                rusqlite::params![code, mode],
            )?;
            Ok(n)
        })
    }

    pub fn set_expiry(&self, code: &str, expires_at: Option<&str>) -> Result<usize> {
        self.write(|conn| {
            let n = conn.execute(
                "UPDATE rooms SET expires_at = ?2 WHERE code = ?1",
                rusqlite::params![code, expires_at],
            )?;
            Ok(n)
        })
    }

    /// Pin a room and clear its deadline. Pinned rooms are invisible to the
    /// reaper regardless of expires_at.
    pub fn set_pinned(&self, code: &str) -> Result<usize> {
        self.write(|conn| {
            let n = conn.execute(
                "UPDATE rooms SET is_pinned = 1, expires_at = NULL WHERE code = ?1",
                [code],
            )?;
            Ok(n)
        })
    }

    /// Idempotent: deleting an absent room affects 0 rows and is not an
    /// error. Items and versions go with it via ON DELETE CASCADE.
    pub fn delete_room(&self, code: &str) -> Result<usize> {
        self.write(|conn| {
            let n = conn.execute("DELETE FROM rooms WHERE code = ?1", [code])?;
            Ok(n)
        })
    }

    /// Codes of rooms past their deadline and not pinned, oldest deadline
    /// first, capped at `limit`.
    pub fn expired_room_codes(&self, now: &str, limit: usize) -> Result<Vec<String>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT code FROM rooms
                 WHERE expires_at IS NOT NULL
                   AND expires_at < ?1
                   AND is_pinned = 0
                 ORDER BY expires_at ASC
                 LIMIT ?2",
            )?;
            let codes = stmt
                .query_map(rusqlite::params![now, limit as i64], |row| {
                    row.get::<_, String>(0)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(codes)
        })
    }
}

fn query_room(conn: &Connection, code: &str) -> Result<Option<RoomRow>> {
    let mut stmt = conn.prepare(
        "SELECT code, created_at, expires_at, is_pinned, access_mode
         FROM rooms WHERE code = ?1",
    )?;

    let row = stmt
        .query_row([code], |row| {
            Ok(RoomRow {
                code: row.get(0)?,
                created_at: row.get(1)?,
                expires_at: row.get(2)?,
                is_pinned: row.get(3)?,
                access_mode: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}
