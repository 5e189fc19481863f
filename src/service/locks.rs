//! Per-User Run Locks
//!
//! 同一ユーザーの検知実行を直列化し、異なるユーザーは並列に実行できるようにする

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct UserRunLocks {
    locks: Arc<RwLock<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl UserRunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// ユーザーのロックを取得（解放はガードの drop 時）
    pub async fn acquire(&self, user_id: Uuid) -> OwnedMutexGuard<()> {
        let existing = {
            let locks = self.locks.read().await;
            locks.get(&user_id).cloned()
        };
        let lock = match existing {
            Some(lock) => lock,
            None => {
                let mut locks = self.locks.write().await;
                locks
                    .entry(user_id)
                    .or_insert_with(|| Arc::new(Mutex::new(())))
                    .clone()
            }
        };
        lock.lock_owned().await
    }

    /// 実行中でないユーザーのロックを破棄
    pub async fn prune_idle(&self) -> usize {
        let mut locks = self.locks.write().await;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    pub async fn tracked_users(&self) -> usize {
        self.locks.read().await.len()
    }
}
