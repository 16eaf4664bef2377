//! Wire codec for the attribute payload carried inside a TLS extension:
//! UTF-8 lines of `key=value\n`, terminated by NUL.

use arrayvec::ArrayVec;

use crate::attrs::AttributeStore;
use crate::proto::{ENCODE_SCRATCH_SIZE, MAX_DATAGRAM_SIZE, WIRE_ATTR_NAMES};
use crate::result::Error;

/// Encode a store in its iteration order as `key=value\n` lines plus a
/// trailing NUL. Fails with `BufferTooSmall` rather than truncating.
pub fn encode(store: &AttributeStore) -> Result<Vec<u8>, Error> {
    encode_bounded::<ENCODE_SCRATCH_SIZE>(store)
}

/// Encode with the datagram payload budget (508 bytes including the NUL).
pub(crate) fn encode_datagram(store: &AttributeStore) -> Result<Vec<u8>, Error> {
    encode_bounded::<MAX_DATAGRAM_SIZE>(store)
}

fn encode_bounded<const N: usize>(store: &AttributeStore) -> Result<Vec<u8>, Error> {
    let mut bb = ArrayVec::<u8, N>::new();
    for (key, val) in store.iter() {
        bb.try_extend_from_slice(key.as_bytes())
            .map_err(|_| Error::BufferTooSmall)?;
        bb.try_push(b'=').map_err(|_| Error::BufferTooSmall)?;
        bb.try_extend_from_slice(val.as_bytes())
            .map_err(|_| Error::BufferTooSmall)?;
        bb.try_push(b'\n').map_err(|_| Error::BufferTooSmall)?;
    }
    bb.try_push(0).map_err(|_| Error::BufferTooSmall)?;
    Ok(bb.to_vec())
}

/// Decode an untrusted peer payload into `store`, keeping only attributes
/// whose names match the fixed wire table. Returns the number of attributes
/// stored.
///
/// Total over arbitrary input: lines without `=`, unknown names, over-long
/// or non-UTF-8 values are skipped per line and decoding continues. An empty
/// buffer, or one starting with NUL, decodes to zero attributes.
pub fn decode(buf: &[u8], store: &mut AttributeStore) -> usize {
    decode_lines(buf, store, true)
}

/// Permissive decode for replies from the trusted session store, which carry
/// attributes outside the wire namespace (`user.*`, `acct.*`, `sess.*`).
pub(crate) fn decode_trusted(buf: &[u8], store: &mut AttributeStore) -> usize {
    decode_lines(buf, store, false)
}

fn decode_lines(buf: &[u8], store: &mut AttributeStore, wire_only: bool) -> usize {
    let mut accepted = 0;
    let mut rest = buf;
    loop {
        // NUL at the start of a line terminates the payload
        if rest.is_empty() || rest[0] == 0 {
            break;
        }
        let end = rest
            .iter()
            .position(|&b| b == b'\n' || b == 0)
            .unwrap_or(rest.len());
        if decode_line(&rest[..end], store, wire_only).is_some() {
            accepted += 1;
        }
        if end == rest.len() {
            // unterminated final line, the buffer boundary acts as terminator
            break;
        }
        rest = &rest[end + 1..];
    }
    accepted
}

fn decode_line(line: &[u8], store: &mut AttributeStore, wire_only: bool) -> Option<()> {
    let eq = line.iter().position(|&b| b == b'=')?;
    let name = std::str::from_utf8(&line[..eq]).ok()?;
    let value = std::str::from_utf8(&line[eq + 1..]).ok()?;

    if wire_only {
        // prefix match against the fixed table; store under the table name
        let known = WIRE_ATTR_NAMES.iter().find(|n| name.starts_with(**n))?;
        store.set(known, value).ok()
    } else {
        store.set(name, value).ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn wire_store() -> AttributeStore {
        let mut attrs = AttributeStore::new();
        attrs.set("aaa.authority", "aaa.example.net").unwrap();
        attrs.set("aaa.protocol", "http").unwrap();
        attrs.set("aaa.version", "1.0").unwrap();
        attrs
    }

    #[test]
    fn encode_appends_lines_and_nul() {
        let bytes = encode(&wire_store()).unwrap();
        assert_eq!(
            bytes,
            b"aaa.authority=aaa.example.net\naaa.protocol=http\naaa.version=1.0\n\0"
        );
    }

    #[test]
    fn round_trip_preserves_wire_attributes_and_order() {
        let posted = wire_store();
        let bytes = encode(&posted).unwrap();

        let mut recved = AttributeStore::new();
        assert_eq!(decode(&bytes, &mut recved), 3);
        assert_eq!(recved, posted);
    }

    #[test]
    fn unknown_name_is_skipped_without_error() {
        let mut recved = AttributeStore::new();
        let n = decode(b"aaa.protocol=http\nx.y=z\naaa.version=1.0\n", &mut recved);
        assert_eq!(n, 2);
        assert_eq!(recved.get("aaa.protocol"), Some("http"));
        assert_eq!(recved.get("aaa.version"), Some("1.0"));
        assert_eq!(recved.get("x.y"), None);
    }

    #[test]
    fn line_without_separator_is_skipped() {
        let mut recved = AttributeStore::new();
        let n = decode(b"garbage\naaa.protocol=http\n", &mut recved);
        assert_eq!(n, 1);
        assert_eq!(recved.get("aaa.protocol"), Some("http"));
    }

    #[test]
    fn unterminated_final_line_still_decodes() {
        let mut recved = AttributeStore::new();
        let n = decode(b"aaa.protocol=http\naaa.version=1.0", &mut recved);
        assert_eq!(n, 2);
        assert_eq!(recved.get("aaa.version"), Some("1.0"));
    }

    #[test]
    fn empty_and_nul_payloads_decode_to_nothing() {
        let mut recved = AttributeStore::new();
        assert_eq!(decode(b"", &mut recved), 0);
        assert_eq!(decode(b"\0", &mut recved), 0);
        assert_eq!(decode(b"\0aaa.protocol=http\n", &mut recved), 0);
        assert!(recved.is_empty());
    }

    #[test]
    fn nul_mid_buffer_terminates_line_and_payload() {
        let mut recved = AttributeStore::new();
        // NUL ends the first line; the next line starts with the byte after
        // it, and a line-initial NUL would end the payload entirely
        let n = decode(b"aaa.protocol=http\0aaa.version=1.0\n", &mut recved);
        assert_eq!(n, 2);
        assert_eq!(recved.get("aaa.protocol"), Some("http"));
        assert_eq!(recved.get("aaa.version"), Some("1.0"));
    }

    #[test]
    fn arbitrary_bytes_do_not_panic() {
        let mut recved = AttributeStore::new();
        let junk: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        decode(&junk, &mut recved);
        decode(b"=\n==\n=x\nx=\n", &mut recved);
    }

    #[test]
    fn oversized_store_fails_instead_of_truncating() {
        let mut attrs = AttributeStore::new();
        // 40 entries ~ 40 * (12 + 1 + 255 + 1) bytes, past the 8KiB scratch
        for i in 0..40 {
            attrs
                .set(&format!("aaa.attr{:04}", i), &"v".repeat(255))
                .unwrap();
        }
        assert_eq!(encode(&attrs), Err(Error::BufferTooSmall));
    }

    #[test]
    fn trusted_decode_accepts_free_form_names() {
        let mut attrs = AttributeStore::new();
        let n = decode_trusted(b"user.id=4242\nacct.eshop.roles[]=admin\n", &mut attrs);
        assert_eq!(n, 2);
        assert_eq!(attrs.get("user.id"), Some("4242"));
        assert_eq!(attrs.get("acct.eshop.roles[]"), Some("admin"));
    }
}
