//! Singleton construction claims shared by a registry tree
//!
//! One thread at a time may construct a given singleton entry; others wait
//! for it. Each waiting thread records the entry it waits on, so before a
//! thread blocks it can follow the wait-for chain: entry, owning thread,
//! the entry that thread waits on, and so on. If the chain comes back to
//! the caller, blocking would never end and the caller gets the cycle
//! instead.

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::registration::Role;

#[derive(Default)]
struct Claims {
    owners: HashMap<u64, (ThreadId, Role)>,
    waiting: HashMap<ThreadId, u64>,
}

impl Claims {
    /// Roles along the wait-for chain starting at `key`, ending with one
    /// owned by `me`; `None` if the chain ends elsewhere
    fn wait_path(&self, me: ThreadId, mut key: u64) -> Option<Vec<Role>> {
        let mut path = Vec::new();
        // every hop visits a distinct owned entry
        for _ in 0..=self.owners.len() {
            let (owner, role) = self.owners.get(&key)?;
            path.push(role.clone());
            if *owner == me {
                return Some(path);
            }
            key = *self.waiting.get(owner)?;
        }
        None
    }
}

/// Outcome of [`Constructions::claim`]
pub(crate) enum Claim<'a> {
    /// Another thread finished the construction while we waited
    Ready,
    /// The caller constructs; dropping the guard hands the entry back
    Owned(ClaimGuard<'a>),
}

/// Who is constructing which singleton, across one registry tree
#[derive(Default)]
pub(crate) struct Constructions {
    claims: Mutex<Claims>,
    released: Condvar,
}

impl Constructions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claim entry `key` for construction by the current thread.
    ///
    /// Blocks while another thread holds the claim, unless waiting would
    /// close a wait-for cycle; then the roles on that cycle are returned,
    /// starting with `role` and ending with one this thread is constructing.
    pub(crate) fn claim(
        &self,
        key: u64,
        role: &Role,
        is_ready: impl Fn() -> bool,
    ) -> Result<Claim<'_>, Vec<Role>> {
        let me = thread::current().id();
        let mut claims = self.claims.lock();
        loop {
            if is_ready() {
                return Ok(Claim::Ready);
            }
            if !claims.owners.contains_key(&key) {
                claims.owners.insert(key, (me, role.clone()));
                return Ok(Claim::Owned(ClaimGuard {
                    constructions: self,
                    key,
                }));
            }
            if let Some(path) = claims.wait_path(me, key) {
                debug!("Waiting on '{}' would deadlock: {:?}", role, path);
                return Err(path);
            }

            claims.waiting.insert(me, key);
            self.released.wait(&mut claims);
            claims.waiting.remove(&me);
        }
    }
}

/// Held while the current thread constructs a claimed entry
pub(crate) struct ClaimGuard<'a> {
    constructions: &'a Constructions,
    key: u64,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.constructions.claims.lock().owners.remove(&self.key);
        self.constructions.released.notify_all();
    }
}
