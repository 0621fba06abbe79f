use std::future::Future;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::LedgerResult;

/// Per-signer nonce cache that serializes submissions.
///
/// [`reserve`](Self::reserve) hands out a [`NonceGuard`] holding the lock;
/// no other submission from the same signer can start until the guard is
/// committed or dropped. Dropping a guard without committing invalidates the
/// cache, so the next reservation re-reads the nonce from the ledger.
#[derive(Debug, Default)]
pub struct NonceSequencer {
    next: Mutex<Option<u64>>,
}

impl NonceSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the sequencer and return the nonce for the next transaction.
    ///
    /// `fetch` is only awaited when no nonce is cached.
    pub async fn reserve<F, Fut>(&self, fetch: F) -> LedgerResult<NonceGuard<'_>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LedgerResult<u64>>,
    {
        let mut slot = self.next.lock().await;
        let nonce = match *slot {
            Some(n) => n,
            None => {
                let n = fetch().await?;
                debug!(nonce = n, "fetched nonce from ledger");
                *slot = Some(n);
                n
            }
        };
        Ok(NonceGuard {
            slot,
            nonce,
            committed: false,
        })
    }

    /// Forget the cached nonce.
    pub async fn invalidate(&self) {
        *self.next.lock().await = None;
    }

    /// The cached next nonce, if any.
    pub async fn peek(&self) -> Option<u64> {
        *self.next.lock().await
    }
}

/// Exclusive claim on one nonce.
#[derive(Debug)]
pub struct NonceGuard<'a> {
    slot: MutexGuard<'a, Option<u64>>,
    nonce: u64,
    committed: bool,
}

impl NonceGuard<'_> {
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// The transaction was accepted; advance the cache.
    pub fn commit(mut self) {
        *self.slot = Some(self.nonce + 1);
        self.committed = true;
    }

    /// The broadcast failed; drop the cache.
    pub fn invalidate(self) {
        // Drop does the work.
    }
}

impl Drop for NonceGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            debug!(nonce = self.nonce, "invalidating cached nonce");
            *self.slot = None;
        }
    }
}
