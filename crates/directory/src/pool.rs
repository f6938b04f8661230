//! Refcounted pool of node sessions, one per node identity.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sn_domain::error::Result;
use sn_session::NodeSession;

struct PoolEntry {
    refcount: usize,
    session: Arc<NodeSession>,
}

/// Outcome of returning a reference to the pool.
#[derive(Debug)]
pub enum Checkin {
    /// Other holders remain.
    Retained { refcount: usize },
    /// This was the last reference; the caller must stop the session.
    Evicted(Arc<NodeSession>),
    /// The session is not (or no longer) managed by this pool.
    Unknown,
}

/// Result of taking a reference from the pool.
#[derive(Debug)]
pub struct Checkout {
    pub session: Arc<NodeSession>,
    pub created: bool,
    pub refcount: usize,
}

/// The lock is only held to look up, insert, or adjust a refcount.
/// Nothing awaits while holding it.
#[derive(Default)]
pub struct SessionPool {
    entries: Mutex<HashMap<String, PoolEntry>>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a reference to the session for `identity`, calling `create`
    /// under the lock when none exists so concurrent callers share one.
    pub fn checkout(
        &self,
        identity: &str,
        create: impl FnOnce() -> Result<Arc<NodeSession>>,
    ) -> Result<Checkout> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(identity) {
            entry.refcount += 1;
            return Ok(Checkout {
                session: entry.session.clone(),
                created: false,
                refcount: entry.refcount,
            });
        }

        let session = create()?;
        entries.insert(
            identity.to_string(),
            PoolEntry {
                refcount: 1,
                session: session.clone(),
            },
        );
        Ok(Checkout {
            session,
            created: true,
            refcount: 1,
        })
    }

    /// Drop one reference. The pooled instance must be the same one
    /// that was checked out, not merely one for the same node.
    pub fn checkin(&self, identity: &str, session: &Arc<NodeSession>) -> Checkin {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(identity) else {
            return Checkin::Unknown;
        };
        if !Arc::ptr_eq(&entry.session, session) {
            return Checkin::Unknown;
        }

        entry.refcount -= 1;
        if entry.refcount > 0 {
            return Checkin::Retained {
                refcount: entry.refcount,
            };
        }
        match entries.remove(identity) {
            Some(entry) => Checkin::Evicted(entry.session),
            None => Checkin::Unknown,
        }
    }

    pub fn refcount(&self, identity: &str) -> Option<usize> {
        self.entries.lock().get(identity).map(|e| e.refcount)
    }

    /// Pooled identities, sorted.
    pub fn identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Remove every entry regardless of refcount.
    pub fn drain(&self) -> Vec<Arc<NodeSession>> {
        self.entries
            .lock()
            .drain()
            .map(|(_, entry)| entry.session)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sn_session::testing::{self, FakeNode};

    fn new_session(fake: &Arc<FakeNode>, key: &str) -> Arc<NodeSession> {
        Arc::new(
            NodeSession::new(
                Arc::new(fake.node_ref(key, None)),
                testing::device_identity(),
                fake.clone(),
                testing::fast_options(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn checkout_shares_one_session() {
        let fake = FakeNode::new();
        let pool = SessionPool::new();
        let first = pool.checkout("a", || Ok(new_session(&fake, "a"))).unwrap();
        let second = pool
            .checkout("a", || panic!("must reuse pooled session"))
            .unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(second.refcount, 2);
        assert!(Arc::ptr_eq(&first.session, &second.session));
    }

    #[test]
    fn last_checkin_evicts() {
        let fake = FakeNode::new();
        let pool = SessionPool::new();
        let s = pool.checkout("a", || Ok(new_session(&fake, "a"))).unwrap().session;
        pool.checkout("a", || unreachable!()).unwrap();

        assert!(matches!(pool.checkin("a", &s), Checkin::Retained { refcount: 1 }));
        assert!(matches!(pool.checkin("a", &s), Checkin::Evicted(_)));
        assert!(pool.is_empty());
        assert!(matches!(pool.checkin("a", &s), Checkin::Unknown));
    }

    #[test]
    fn foreign_instance_is_unknown() {
        let fake = FakeNode::new();
        let pool = SessionPool::new();
        pool.checkout("a", || Ok(new_session(&fake, "a"))).unwrap();
        let stranger = new_session(&fake, "a");
        assert!(matches!(pool.checkin("a", &stranger), Checkin::Unknown));
        assert_eq!(pool.refcount("a"), Some(1));
    }

    #[test]
    fn failed_create_leaves_no_entry() {
        let pool = SessionPool::new();
        let err = pool.checkout("a", || {
            Err(sn_domain::Error::Crypto("bad key".into()))
        });
        assert!(err.is_err());
        assert!(pool.is_empty());
    }
}
