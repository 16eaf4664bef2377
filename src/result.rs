use std::fmt;

/// An error that can occur while exchanging, deriving or binding session
/// attributes.
///
/// Handshake-phase callbacks never surface these through the TLS layer as
/// fatal; at most a synchronous-mode rejection forces a TLS-level shutdown.
/// The consumer-facing session API returns them directly so the hosting
/// application can act (e.g. deny the request).
#[derive(Debug)]
pub enum Error {
    /// An invalid parameter was supplied: malformed or oversized attribute,
    /// missing or empty `sess.id`, or missing authority/handler configuration.
    InvalidArgument,

    /// The TLS layer cannot produce exported keying material, either because
    /// the handshake has not completed or the stack does not support the
    /// export.
    CryptoUnavailable,

    /// The protocol declared by the remote peer does not agree with the
    /// locally configured protocol.
    ProtocolMismatch,

    /// The external authority denied the binding.
    AuthorityRejected,

    /// A blocking external call exceeded its bound. Treated the same as a
    /// rejection by callers.
    Timeout,

    /// An encoded payload does not fit its fixed-capacity buffer. Encoding
    /// never truncates silently.
    BufferTooSmall,

    /// Datagram or process I/O failure other than a timeout.
    Io(std::io::Error),
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        use Error::*;
        match (self, other) {
            (InvalidArgument, InvalidArgument) => true,
            (CryptoUnavailable, CryptoUnavailable) => true,
            (ProtocolMismatch, ProtocolMismatch) => true,
            (AuthorityRejected, AuthorityRejected) => true,
            (Timeout, Timeout) => true,
            (BufferTooSmall, BufferTooSmall) => true,
            (Io(a), Io(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument => f.write_str("invalid argument"),
            Error::CryptoUnavailable => f.write_str("keying material export unavailable"),
            Error::ProtocolMismatch => f.write_str("peer/local protocol mismatch"),
            Error::AuthorityRejected => f.write_str("authority rejected binding"),
            Error::Timeout => f.write_str("external call timed out"),
            Error::BufferTooSmall => f.write_str("payload exceeds buffer capacity"),
            Error::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => Error::Timeout,
            _ => Error::Io(e),
        }
    }
}
