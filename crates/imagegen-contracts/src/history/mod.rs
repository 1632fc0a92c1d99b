mod record;
mod slot;
mod store;

pub use record::{new_record_id, GeneratedImageRecord, HistoryCollection};
pub use slot::{FileSlot, MemorySlot, StorageSlot};
pub use store::{
    HistoryStore, StorageUsage, HISTORY_SLOT_NAME, MAX_HISTORY_SIZE, STORAGE_QUOTA_BYTES,
};
