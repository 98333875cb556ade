//! Room registry operations.

use chrono::Utc;
use tracing::{info, warn};

use alcove_blob::BlobStore;
use alcove_code::CODE_LEN;
use alcove_db::models::RoomRow;
use alcove_types::{AccessMode, Error, Result, Room, RoomTtl};

use crate::{Engine, room_from_row, ts};

const MAX_CODE_ATTEMPTS: u32 = 5;

impl Engine {
    /// Create a room with a freshly drawn code. A code collision is a
    /// vanishingly rare event at 40 bits, but it gets a bounded redraw loop
    /// rather than an assumption.
    pub fn create_room(&self, ttl: Option<RoomTtl>) -> Result<Room> {
        let now = Utc::now();
        let ttl = ttl.unwrap_or(self.limits.default_ttl);
        let expires_at = now + ttl.as_duration();

        for _ in 0..MAX_CODE_ATTEMPTS {
            let row = RoomRow {
                code: alcove_code::generate(CODE_LEN),
                created_at: ts(now),
                expires_at: Some(ts(expires_at)),
                is_pinned: false,
                access_mode: AccessMode::FullAccess.as_str().to_string(),
            };
            if self.db.insert_room(&row)? {
                info!("Room {} created, expires {}", row.code, ts(expires_at));
                return room_from_row(&row);
            }
            warn!("Room code collision on {}, redrawing", row.code);
        }
        Err(Error::AllocationFailure {
            attempts: MAX_CODE_ATTEMPTS,
        })
    }

    /// Room metadata. Returns `RoomNotFound` for dead rooms — reads of room
    /// state are not gated by access mode, only by possession of the code.
    pub fn room(&self, code: &str) -> Result<Room> {
        self.live_room(code)
    }

    /// Takes effect for the very next evaluated operation; nothing caches
    /// the previous mode.
    pub fn set_access_mode(&self, code: &str, mode: AccessMode) -> Result<Room> {
        self.live_room(code)?;
        if self.db.set_access_mode(code, mode.as_str())? == 0 {
            // Reaped between the check and the update.
            return Err(Error::RoomNotFound);
        }
        info!("Room {} access mode set to {}", code, mode.as_str());
        self.live_room(code)
    }

    /// Restart the expiry clock from now with one of the fixed windows.
    pub fn set_expiry(&self, code: &str, ttl: RoomTtl) -> Result<Room> {
        self.live_room(code)?;
        let expires_at = ts(Utc::now() + ttl.as_duration());
        if self.db.set_expiry(code, Some(&expires_at))? == 0 {
            return Err(Error::RoomNotFound);
        }
        info!("Room {} expiry set to {}", code, expires_at);
        self.live_room(code)
    }

    /// Exempt the room from reaping permanently and drop its deadline.
    pub fn pin_room(&self, code: &str) -> Result<Room> {
        self.live_room(code)?;
        if self.db.set_pinned(code)? == 0 {
            return Err(Error::RoomNotFound);
        }
        info!("Room {} pinned", code);
        self.live_room(code)
    }

    /// User-triggered immediate deletion. Idempotent: deleting an absent or
    /// already-deleted room is a successful no-op, because a user delete may
    /// race the reaper for the same room.
    pub async fn delete_room(&self, code: &str) -> Result<()> {
        self.destroy_room(code).await
    }

    /// Blobs first, registry row last. Every step tolerates already-gone
    /// state, so a crash mid-way is healed by running it again.
    pub(crate) async fn destroy_room(&self, code: &str) -> Result<()> {
        let keys = self.blobs.list_keys(&format!("{code}/")).await?;
        for key in &keys {
            self.blobs.delete(key).await?;
        }
        let removed = self.db.delete_room(code)?;
        if removed > 0 {
            info!("Room {} destroyed ({} blobs)", code, keys.len());
        }
        Ok(())
    }
}
