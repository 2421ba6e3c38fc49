//! Per-account mutual exclusion for sync passes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>;

/// Keyed locks; a held guard marks a pass in progress for that account.
///
/// Entries only exist while a guard is held or being acquired.
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: LockMap,
}

/// Held for the duration of one pass. Dropping it releases the account.
#[derive(Debug)]
pub struct AccountGuard {
    guard: Option<OwnedMutexGuard<()>>,
    account_id: Uuid,
    locks: LockMap,
}

impl Drop for AccountGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        // Count 1 means only the map holds it; acquirers clone under this same lock.
        if locks
            .get(&self.account_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.account_id);
        }
    }
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` when another pass already holds the account.
    pub fn try_acquire(&self, account_id: Uuid) -> Option<AccountGuard> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poison| poison.into_inner());
            locks
                .entry(account_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = lock.try_lock_owned().ok()?;
        Some(AccountGuard {
            guard: Some(guard),
            account_id,
            locks: self.locks.clone(),
        })
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .len()
    }
}
