/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Consumer-facing session API. The hosting application uses this to
//! retrieve the verified identity after handshake completion and to extend
//! session expiry.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::attrs::AttributeStore;
use crate::config::AaaConfig;
use crate::proto::SESSION_EXPIRES;
use crate::result::Error;
use crate::session::Endpoint;
use crate::store::SessionStore;

/// One logical identity-binding session: a flat attribute set keyed by
/// `sess.id`, exchanged with the external session store.
///
/// None of the methods are internally synchronized. A session shared across
/// worker threads (the typical hosting-server arrangement) requires external
/// mutual exclusion around `bind`/`commit`/`reset` and the `attr_*` calls.
///
/// Exactly one session id is bound at a time: `bind` locks in the current
/// `sess.id`, and rebinding requires a `reset` first (which clears it).
pub struct Aaa {
    attrs: AttributeStore,
    endpoint: Endpoint,
    timeout: u64,
    sid: Option<String>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Aaa {
    /// Create a session. The first call in a process loads the environment
    /// configuration snapshot (idempotent).
    pub fn new(endpoint: Endpoint) -> Self {
        let _ = AaaConfig::global();
        Self {
            attrs: AttributeStore::new(),
            endpoint,
            timeout: SESSION_EXPIRES,
            sid: None,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Override the expiry window used by `touch`, in seconds.
    pub fn set_timeout(&mut self, timeout: u64) {
        self.timeout = timeout;
    }

    pub fn attr_set(&mut self, name: &str, value: &str) -> Result<(), Error> {
        self.attrs.set(name, value)
    }

    pub fn attr_get(&self, name: &str) -> Option<&str> {
        self.attrs.get(name)
    }

    /// Reset the attribute cursor and return the first attribute name.
    /// Returned owned so the session can be read while iterating.
    pub fn attr_first(&mut self) -> Option<String> {
        self.attrs.first().map(str::to_owned)
    }

    /// Advance the attribute cursor; see `AttributeStore::next`.
    pub fn attr_next(&mut self) -> Option<String> {
        self.attrs.next().map(str::to_owned)
    }

    /// Cursor-free view of all attributes in their current order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter()
    }

    /// Lock in the current `sess.id` and retrieve the stored attribute set.
    /// Fails with `InvalidArgument` before any I/O when `sess.id` is missing
    /// or empty.
    pub fn bind<S: SessionStore>(&mut self, store: &mut S) -> Result<(), Error> {
        let sid = match self.attrs.get("sess.id") {
            Some(sid) if !sid.is_empty() => sid.to_owned(),
            _ => return Err(Error::InvalidArgument),
        };
        store.bind(&sid, &mut self.attrs)?;
        self.sid = Some(sid);
        Ok(())
    }

    /// Sort attributes deterministically and send the final state to the
    /// external store. Same `sess.id` precondition as `bind`.
    pub fn commit<S: SessionStore>(&mut self, store: &mut S) -> Result<(), Error> {
        let sid = match self.attrs.get("sess.id") {
            Some(sid) if !sid.is_empty() => sid.to_owned(),
            _ => return Err(Error::InvalidArgument),
        };
        self.sid = Some(sid.clone());
        self.attrs.sort();
        store.commit(&sid, &self.attrs)
    }

    /// Recompute `sess.modified` and `sess.expires` from the current time.
    pub fn touch(&mut self) -> Result<(), Error> {
        self.touch_at(unix_now())
    }

    /// `touch` with an explicit clock, for deterministic callers and tests.
    pub fn touch_at(&mut self, now: u64) -> Result<(), Error> {
        match self.attrs.get("sess.id") {
            Some(sid) if !sid.is_empty() => {}
            _ => return Err(Error::InvalidArgument),
        }
        let modified = now;
        let expires = modified + self.timeout;
        self.attrs.set("sess.modified", &modified.to_string())?;
        self.attrs.set("sess.expires", &expires.to_string())?;
        Ok(())
    }

    /// Flush all attributes and unbind, keeping the session object alive for
    /// the next transaction.
    pub fn reset(&mut self) {
        self.attrs.flush();
        self.sid = None;
    }
}
