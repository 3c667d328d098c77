use crate::domain::ledger::StudentNo;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::{Mutex, MutexGuard};

pub const DEFAULT_SHARDS: usize = 64;

/// Serializes settlements per student.
///
/// Students are hashed onto a fixed set of shards, so two settlements for
/// the same student never overlap while unrelated students rarely wait on
/// each other.
pub struct StudentLocks {
    shards: Vec<Mutex<()>>,
}

impl Default for StudentLocks {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}

impl StudentLocks {
    pub fn new(shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn shard_of(&self, student_no: &StudentNo) -> usize {
        let mut hasher = DefaultHasher::new();
        student_no.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    pub async fn lock(&self, student_no: &StudentNo) -> MutexGuard<'_, ()> {
        self.shards[self.shard_of(student_no)].lock().await
    }
}
