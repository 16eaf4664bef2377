//! Session-store exchange: a connectionless request/reply client keyed by
//! `sess.id`, used by `bind` to retrieve a stored attribute set and by
//! `commit` to persist one.

use std::net::UdpSocket;
use std::time::Duration;

use crate::attrs::AttributeStore;
use crate::codec;
use crate::proto::{EXTERNAL_CALL_TIMEOUT, MAX_DATAGRAM_SIZE};
use crate::result::Error;

/// Request/reply store exchange keyed by `sess.id`.
///
/// Not internally synchronized: callers sharing one store across worker
/// threads must provide external mutual exclusion, as with the consumer
/// session itself.
pub trait SessionStore {
    /// Look up `sid` and populate `attrs` from the stored attribute set.
    fn bind(&mut self, sid: &str, attrs: &mut AttributeStore) -> Result<(), Error>;

    /// Persist the full (sorted) attribute set under `sid`.
    fn commit(&mut self, sid: &str, attrs: &AttributeStore) -> Result<(), Error>;
}

/// Datagram client for the session store.
///
/// Payloads use the same `key=value\n` text as the extension codec and are
/// capped at the 508-byte safe UDP payload; an attribute set that does not
/// fit fails the exchange with `BufferTooSmall`. Reads are bounded by a
/// short timeout with a single retry, failing closed with `Timeout`.
pub struct UdpStore {
    server: String,
    timeout: Duration,
}

impl UdpStore {
    pub fn new(server: impl Into<String>) -> Self {
        Self { server: server.into(), timeout: EXTERNAL_CALL_TIMEOUT }
    }

    pub fn with_timeout(server: impl Into<String>, timeout: Duration) -> Self {
        Self { server: server.into(), timeout }
    }

    fn exchange(&self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.set_read_timeout(Some(self.timeout))?;
        socket.connect(self.server.as_str())?;

        // single retry, then fail closed
        for _ in 0..2 {
            socket.send(payload)?;
            let mut buf = [0u8; MAX_DATAGRAM_SIZE];
            match socket.recv(&mut buf) {
                Ok(n) => return Ok(buf[..n].to_vec()),
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Err(Error::Timeout)
    }
}

impl SessionStore for UdpStore {
    fn bind(&mut self, sid: &str, attrs: &mut AttributeStore) -> Result<(), Error> {
        let mut req = AttributeStore::new();
        req.set("sess.id", sid)?;
        let payload = codec::encode_datagram(&req)?;

        let reply = self.exchange(&payload)?;
        codec::decode_trusted(&reply, attrs);
        Ok(())
    }

    fn commit(&mut self, sid: &str, attrs: &AttributeStore) -> Result<(), Error> {
        debug_assert_eq!(attrs.get("sess.id"), Some(sid));
        let payload = codec::encode_datagram(attrs)?;

        // reply is an acknowledgement; its content is not consumed
        self.exchange(&payload)?;
        Ok(())
    }
}
