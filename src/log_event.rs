use crate::session::{Endpoint, SkipReason};

/// Binding-engine events that might be interesting to log or aggregate into
/// metrics. Handed to `AuthorityLayer::event_log`; must not be used for
/// protocol-level decisions.
#[derive(Debug)]
pub enum LogEvent<'a> {
    /// Extension payload serialized and handed to the TLS layer.
    ExtensionSent { endpoint: Endpoint, len: usize },
    /// Peer extension payload received and decoded. `accepted` counts the
    /// attributes that matched the wire table.
    ExtensionReceived { ext_type: u16, len: usize, accepted: usize },
    /// Payload arrived on an extension type this engine does not consume.
    ExtensionIgnored { ext_type: u16 },
    CertificatePresent {
        endpoint: Endpoint,
        subject: &'a str,
        issuer: &'a str,
    },
    AlpnSelected(&'a str),
    /// Binding key and id derived from exported keying material.
    KeysDerived { binding_id: &'a str },
    BindingSkipped(SkipReason),
    /// `(sess.id, sess.key)` registered with the session store for the
    /// consuming application.
    SessionPublished { session_id: &'a str },
    ProtocolMismatch { client: &'a str, server: &'a str },
    /// Server-side pre-registration call failed; binding continues.
    PreRegisterFailed,
    AuthorityAccepted,
    /// Authority verdict was negative in asynchronous mode; handshake
    /// completes regardless.
    AuthorityForbidden,
    /// Synchronous-mode rejection: verify result set and connection shut down.
    HandshakeShutdown,
}
