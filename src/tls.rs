//! Capability surface consumed from the embedding's TLS stack.
//!
//! The binding engine never owns the handshake; it reacts to extension and
//! handshake-info callbacks and pulls what it needs through this trait.

use crate::result::Error;

/// Verification outcome recorded on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyResult {
    Ok,
    /// Distinguished "application verification failed" code, set before a
    /// deliberate synchronous-mode shutdown.
    ApplicationVerificationFailed,
}

/// Subject and issuer of an endpoint certificate, for reporting only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
}

/// Optional TLS-stack features, resolved once at startup rather than probed
/// per call. A capability that is absent makes the engine skip the dependent
/// step; it never fails the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsCapabilities {
    /// Master switch for the attribute exchange and channel binding.
    pub session_binding: bool,
    /// RFC 5705 keying material export is available.
    pub keying_material_export: bool,
    /// Session-id lookup is available (ticket-only stacks lack it).
    pub session_lookup: bool,
}

impl Default for TlsCapabilities {
    fn default() -> Self {
        Self {
            session_binding: true,
            keying_material_export: true,
            session_lookup: true,
        }
    }
}

/// One TLS connection as seen from inside its handshake callbacks.
///
/// Callbacks are invoked synchronously on the thread performing the
/// handshake, so implementations need no internal synchronization.
pub trait TlsLayer {
    /// RFC 5705 exporter. Fails with `CryptoUnavailable` before handshake
    /// completion or when the stack cannot export.
    fn export_keying_material(
        &mut self,
        label: &str,
        context: Option<&[u8]>,
        length: usize,
    ) -> Result<Vec<u8>, Error>;

    /// TLS session id, if the stack has one. `None` or empty for
    /// ticket-based resumption.
    fn session_id(&mut self) -> Option<Vec<u8>>;

    /// This endpoint's own certificate.
    fn certificate(&mut self) -> Option<CertificateInfo>;

    /// The remote peer's certificate.
    fn peer_certificate(&mut self) -> Option<CertificateInfo>;

    /// ALPN protocol selected during the handshake, if any.
    fn alpn_selected(&mut self) -> Option<Vec<u8>>;

    fn set_verify_result(&mut self, result: VerifyResult);

    /// Forcibly shut the connection down; used by the synchronous rejection
    /// path to abort the handshake.
    fn shutdown(&mut self);
}
