use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per identity, so mutations of the same identity run one
/// at a time while different identities proceed in parallel.
#[derive(Debug, Default)]
pub struct IdentityLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl IdentityLocks {
    pub async fn acquire(&self, identity_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop entries nobody holds or waits on.
            locks.retain(|id, lock| *id == identity_id || Arc::strong_count(lock) > 1);
            locks.entry(identity_id).or_default().clone()
        };

        lock.lock_owned().await
    }
}
