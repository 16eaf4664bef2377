use std::time::Duration;

/* Wire attribute namespace */

/// Authority location advertised by the server inside its extension payload.
pub const WIRE_ATTR_AUTHORITY: &str = "aaa.authority";
/// Application protocol each endpoint declares for the binding exchange.
pub const WIRE_ATTR_PROTOCOL: &str = "aaa.protocol";
/// Attribute-exchange protocol version.
pub const WIRE_ATTR_VERSION: &str = "aaa.version";

/// Fixed table of attribute names accepted from untrusted peer payloads.
/// Small enough that lookups are a linear scan.
pub(crate) const WIRE_ATTR_NAMES: [&str; 3] = [WIRE_ATTR_AUTHORITY, WIRE_ATTR_PROTOCOL, WIRE_ATTR_VERSION];

/// Version string posted as `aaa.version` by both endpoints.
pub const AAA_VERSION: &str = "1.0";

/// Default TLS extension type id carrying the attribute payload.
pub const EXT_TYPE_AAA: u16 = 1000;

/* Attribute limits */

pub(crate) const ATTR_NAME_MAX: usize = 64;
pub(crate) const ATTR_VALUE_MAX: usize = 255;

/// Scratch capacity for encoding one extension payload.
pub(crate) const ENCODE_SCRATCH_SIZE: usize = 8192;

/// The maximum safe UDP payload is 508 bytes. This is a packet size of 576
/// (the "minimum maximum reassembly buffer size"), minus the maximum 60-byte
/// IP header and the 8-byte UDP header.
pub const MAX_DATAGRAM_SIZE: usize = 508;

/* Key derivation (RFC 5705 exporter) */

/// Exporter label under which the binding key is derived.
pub const EXPORTER_LABEL: &str = "EXPORTER_AAA";
/// Raw binding-key length in bytes, before hex encoding.
pub const EXPORTER_LENGTH: usize = 16;

pub(crate) const SHA1_SIZE: usize = 20;
/// Raw binding-id length: the first half of a SHA-1 digest.
pub const BINDING_ID_SIZE: usize = SHA1_SIZE / 2;

/* Session defaults */

/// Default consumer-session expiry in seconds, applied by `touch`.
pub const SESSION_EXPIRES: u64 = 300;

/// Bound on blocking external calls: the synchronous authority wait and each
/// datagram read. A hung authority would otherwise stall every handshake on
/// the calling thread.
pub const EXTERNAL_CALL_TIMEOUT: Duration = Duration::from_secs(1);
