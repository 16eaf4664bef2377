/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Per-connection binding engine, driven by the embedding's TLS callbacks:
//! extension add/get during negotiation, then handshake completion, which
//! derives the binding keys, reports them to the external authority and
//! publishes the identity for the consuming application.

use std::collections::HashMap;
use std::sync::Mutex;

use zeroize::Zeroizing;

use crate::aaa::Aaa;
use crate::application::{AuthorityLayer, BindingReport, HandshakeMode};
use crate::attrs::AttributeStore;
use crate::codec;
use crate::config::AaaConfig;
use crate::kdf::BindingKeys;
use crate::proto::{
    AAA_VERSION, EXPORTER_LABEL, EXPORTER_LENGTH, EXT_TYPE_AAA, WIRE_ATTR_AUTHORITY,
    WIRE_ATTR_PROTOCOL, WIRE_ATTR_VERSION,
};
use crate::result::Error;
use crate::store::SessionStore;
use crate::tls::{TlsCapabilities, TlsLayer, VerifyResult};
#[cfg(feature = "logging")]
use crate::LogEvent::*;

macro_rules! log {
    ($app:expr, $event:expr) => {
        #[cfg(feature = "logging")]
        $app.event_log($event);
    };
}

/// Which side of the instrumented handshake a connection is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// No extension callback has fired yet for this connection.
    Undetermined,
    Client,
    Server,
}

/// Handshake-lifecycle state of one connection's binding exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Unbound,
    ExtensionNegotiating,
    KeysDerived,
    AuthorityContacted,
    Bound,
    Rejected,
}

/// Identifies one TLS connection object in the embedding. The embedding
/// chooses the value (pointer address, fd, connection counter); it only has
/// to be unique among live connections.
pub type ConnectionId = u64;

/// Why a connection's binding was skipped without error. The handshake
/// proceeds unbound in every one of these cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Channel binding is disabled in the TLS capability set.
    BindingDisabled,
    /// No extension callback ever identified the endpoint role.
    RoleUndetermined,
    /// Neither an own nor a peer certificate was available.
    NoCertificate,
    /// The TLS stack could not export keying material.
    NoKeyingMaterial,
}

/// Result of handshake-completion processing for one connection.
#[derive(Debug, PartialEq)]
pub enum BindingOutcome {
    /// Binding was skipped; the handshake proceeds without one.
    Skipped(SkipReason),
    /// Identity bound and, on the server, published for consumer retrieval.
    /// `session_id` is the handle the binding was reported under: the TLS
    /// session id (or binding key fallback) on the server, the binding id
    /// on the client.
    Bound { session_id: String },
    /// Binding was rejected. Only the synchronous authority path also aborts
    /// the TLS connection; otherwise the transport never sees this.
    Rejected(Error),
}

/// Per-connection binding state, attached to a TLS connection for the
/// duration of its handshake and destroyed at handshake-completion teardown.
pub struct TlsSession {
    /// Attributes received from the peer's extension payload.
    recved: AttributeStore,
    /// Attributes this endpoint posted into its own payload.
    posted: AttributeStore,
    keys: Option<BindingKeys>,
    endpoint: Endpoint,
    state: BindingState,
}

impl TlsSession {
    fn new() -> Self {
        Self {
            recved: AttributeStore::new(),
            posted: AttributeStore::new(),
            keys: None,
            endpoint: Endpoint::Undetermined,
            state: BindingState::Unbound,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn state(&self) -> BindingState {
        self.state
    }

    pub fn recved(&self) -> &AttributeStore {
        &self.recved
    }

    pub fn posted(&self) -> &AttributeStore {
        &self.posted
    }

    /// Binding id, once keying material has been derived.
    pub fn binding_id(&self) -> Option<&str> {
        self.keys.as_ref().map(|k| k.id_hex())
    }
}

/// Connection side table plus the drivers for the TLS callback events.
///
/// One `Context` serves many connections. Sessions are created lazily on
/// first extension touch and destroyed at the end of handshake-completion
/// processing regardless of outcome. The table is safe for concurrent
/// creation by threads handling different connections; callbacks for one
/// connection are serial by construction (the TLS layer runs them on the
/// handshaking thread).
pub struct Context {
    config: AaaConfig,
    caps: TlsCapabilities,
    mode: HandshakeMode,
    sessions: Mutex<HashMap<ConnectionId, TlsSession>>,
}

impl Context {
    pub fn new(config: AaaConfig, caps: TlsCapabilities, mode: HandshakeMode) -> Self {
        Self {
            config,
            caps,
            mode,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &AaaConfig {
        &self.config
    }

    /// Read access to a live session, for the embedding and for tests.
    /// Returns `None` once handshake completion has torn the session down.
    pub fn with_session<R>(
        &self,
        conn: ConnectionId,
        f: impl FnOnce(&TlsSession) -> R,
    ) -> Option<R> {
        self.sessions.lock().ok()?.get(&conn).map(f)
    }

    /// Extension-add callback (send side). Records the endpoint role,
    /// serializes the local attributes and returns the payload to hand to
    /// the TLS layer, or `None` when binding is disabled.
    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    pub fn on_extension_add<A: AuthorityLayer>(
        &self,
        conn: ConnectionId,
        endpoint: Endpoint,
        app: &mut A,
    ) -> Result<Option<Vec<u8>>, Error> {
        let mut sessions = self.sessions.lock().map_err(|_| Error::InvalidArgument)?;
        let sp = sessions.entry(conn).or_insert_with(TlsSession::new);
        sp.endpoint = endpoint;

        if !self.caps.session_binding {
            return Ok(None);
        }
        sp.state = BindingState::ExtensionNegotiating;

        match endpoint {
            Endpoint::Server => {
                if let Some(authority) = &self.config.authority {
                    sp.posted.set(WIRE_ATTR_AUTHORITY, authority)?;
                }
                if let Some(protocol) = &self.config.protocol {
                    sp.posted.set(WIRE_ATTR_PROTOCOL, protocol)?;
                }
                sp.posted.set(WIRE_ATTR_VERSION, AAA_VERSION)?;
            }
            Endpoint::Client => {
                if let Some(protocol) = &self.config.protocol {
                    sp.posted.set(WIRE_ATTR_PROTOCOL, protocol)?;
                }
                sp.posted.set(WIRE_ATTR_VERSION, AAA_VERSION)?;
            }
            Endpoint::Undetermined => return Err(Error::InvalidArgument),
        }

        let payload = codec::encode(&sp.posted)?;
        log!(app, ExtensionSent { endpoint, len: payload.len() });
        Ok(Some(payload))
    }

    /// Extension-get callback (receive side). Decodes the peer payload into
    /// the session's received set; payloads on other extension types pass
    /// through untouched.
    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    pub fn on_extension_data<A: AuthorityLayer>(
        &self,
        conn: ConnectionId,
        ext_type: u16,
        data: &[u8],
        app: &mut A,
    ) {
        if ext_type != EXT_TYPE_AAA || data.is_empty() {
            log!(app, ExtensionIgnored { ext_type });
            return;
        }
        let Ok(mut sessions) = self.sessions.lock() else {
            return;
        };
        let sp = sessions.entry(conn).or_insert_with(TlsSession::new);
        sp.state = BindingState::ExtensionNegotiating;
        let accepted = codec::decode(data, &mut sp.recved);
        log!(app, ExtensionReceived { ext_type, len: data.len(), accepted });
    }

    /// Handshake-completion callback, fired once the peer certificate and
    /// ALPN selection are known. Always tears the connection's session
    /// entry down; binding failures never propagate to the transport except
    /// through the deliberate synchronous-mode shutdown.
    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    pub fn on_handshake_done<T, A, S>(
        &self,
        conn: ConnectionId,
        tls: &mut T,
        app: &mut A,
        store: &mut S,
    ) -> BindingOutcome
    where
        T: TlsLayer,
        A: AuthorityLayer,
        S: SessionStore,
    {
        let sp = match self.sessions.lock() {
            Ok(mut sessions) => sessions.remove(&conn),
            Err(_) => None,
        };
        let Some(mut sp) = sp else {
            return BindingOutcome::Skipped(SkipReason::RoleUndetermined);
        };

        if !self.caps.session_binding {
            return BindingOutcome::Skipped(SkipReason::BindingDisabled);
        }

        // the server authenticates with its own certificate, the client
        // checks the peer's; with neither, binding is skipped entirely
        let cert = match sp.endpoint {
            Endpoint::Server => tls.certificate(),
            Endpoint::Client => tls.peer_certificate(),
            Endpoint::Undetermined => {
                log!(app, BindingSkipped(SkipReason::RoleUndetermined));
                return BindingOutcome::Skipped(SkipReason::RoleUndetermined);
            }
        };
        let Some(cert) = cert else {
            log!(app, BindingSkipped(SkipReason::NoCertificate));
            return BindingOutcome::Skipped(SkipReason::NoCertificate);
        };
        log!(
            app,
            CertificatePresent {
                endpoint: sp.endpoint,
                subject: &cert.subject,
                issuer: &cert.issuer,
            }
        );

        if !self.caps.keying_material_export {
            log!(app, BindingSkipped(SkipReason::NoKeyingMaterial));
            return BindingOutcome::Skipped(SkipReason::NoKeyingMaterial);
        }
        let raw = match tls.export_keying_material(EXPORTER_LABEL, None, EXPORTER_LENGTH) {
            Ok(raw) => Zeroizing::new(raw),
            Err(_) => {
                log!(app, BindingSkipped(SkipReason::NoKeyingMaterial));
                return BindingOutcome::Skipped(SkipReason::NoKeyingMaterial);
            }
        };
        let keys = BindingKeys::new(raw);
        sp.state = BindingState::KeysDerived;
        log!(app, KeysDerived { binding_id: keys.id_hex() });

        #[cfg(feature = "logging")]
        if let Some(alpn) = tls.alpn_selected() {
            app.event_log(AlpnSelected(&String::from_utf8_lossy(&alpn)));
        }

        let key_hex = keys.key_hex();
        let id_hex = keys.id_hex().to_owned();
        let endpoint = sp.endpoint;
        sp.keys = Some(keys);
        if endpoint == Endpoint::Server {
            self.server_binding(&mut sp, &key_hex, &id_hex, tls, app, store)
        } else {
            self.client_binding(&mut sp, &key_hex, &id_hex, app)
        }
    }

    /// Server path: publish `(sess.id, sess.key)` for the consuming
    /// application, verify protocol agreement, then report the binding to
    /// the external authority in two steps (pre-registration, confirmation).
    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    fn server_binding<T, A, S>(
        &self,
        sp: &mut TlsSession,
        key_hex: &str,
        id_hex: &str,
        tls: &mut T,
        app: &mut A,
        store: &mut S,
    ) -> BindingOutcome
    where
        T: TlsLayer,
        A: AuthorityLayer,
        S: SessionStore,
    {
        // ticket-based stacks have no session id; the binding key hex then
        // doubles as the session handle
        let sess_id = if self.caps.session_lookup {
            tls.session_id()
                .filter(|id| !id.is_empty())
                .map(hex::encode)
                .unwrap_or_else(|| key_hex.to_owned())
        } else {
            key_hex.to_owned()
        };

        // published before any validation, matching the deployed exchange:
        // the store entry exists even when the binding is later rejected
        let mut usr = Aaa::new(Endpoint::Server);
        let published = usr
            .attr_set("sess.id", &sess_id)
            .and_then(|_| usr.attr_set("sess.key", key_hex))
            .and_then(|_| usr.bind(store));
        if published.is_ok() {
            log!(app, SessionPublished { session_id: &sess_id });
        }

        let proto_server = self.config.protocol.as_deref();
        let proto_client = sp.recved.get(WIRE_ATTR_PROTOCOL);
        match (proto_client, proto_server) {
            (Some(client), Some(server)) if client == server => {}
            (Some(client), Some(server)) => {
                log!(app, ProtocolMismatch { client, server });
                sp.state = BindingState::Rejected;
                return BindingOutcome::Rejected(Error::ProtocolMismatch);
            }
            _ => {
                sp.state = BindingState::Rejected;
                return BindingOutcome::Rejected(Error::InvalidArgument);
            }
        }

        let (Some(_handler), Some(authority)) =
            (self.config.handler.as_deref(), self.config.authority.as_deref())
        else {
            sp.state = BindingState::Rejected;
            return BindingOutcome::Rejected(Error::InvalidArgument);
        };

        let report = BindingReport {
            binding_key: key_hex,
            binding_id: id_hex,
            authority,
            group: self.config.group.as_deref(),
            role: self.config.role.as_deref(),
        };

        if app.pre_register(&report).is_err() {
            log!(app, PreRegisterFailed);
        }
        sp.state = BindingState::AuthorityContacted;

        match app.confirm(self.mode, &sess_id, &report) {
            Ok(()) => {
                log!(app, AuthorityAccepted);
                sp.state = BindingState::Bound;
                BindingOutcome::Bound { session_id: sess_id }
            }
            Err(e) => match self.mode {
                HandshakeMode::Synchronous => {
                    // deliberate rejection: poison the verification result
                    // and abort the handshake
                    tls.set_verify_result(VerifyResult::ApplicationVerificationFailed);
                    tls.shutdown();
                    log!(app, HandshakeShutdown);
                    sp.state = BindingState::Rejected;
                    BindingOutcome::Rejected(e)
                }
                HandshakeMode::Asynchronous => {
                    log!(app, AuthorityForbidden);
                    sp.state = BindingState::Bound;
                    BindingOutcome::Bound { session_id: sess_id }
                }
            },
        }
    }

    /// Client path: a single registration with the authority the server
    /// advertised (falling back to the configured one). Walks the same
    /// terminal states as the server path.
    fn client_binding<A: AuthorityLayer>(
        &self,
        sp: &mut TlsSession,
        key_hex: &str,
        id_hex: &str,
        app: &mut A,
    ) -> BindingOutcome {
        let authority = sp
            .recved
            .get(WIRE_ATTR_AUTHORITY)
            .or(self.config.authority.as_deref());

        let (Some(_handler), Some(authority)) = (self.config.handler.as_deref(), authority)
        else {
            sp.state = BindingState::Rejected;
            return BindingOutcome::Rejected(Error::InvalidArgument);
        };

        let report = BindingReport {
            binding_key: key_hex,
            binding_id: id_hex,
            authority,
            group: self.config.group.as_deref(),
            role: self.config.role.as_deref(),
        };

        sp.state = BindingState::AuthorityContacted;
        match app.register(&report) {
            Ok(()) => {
                log!(app, AuthorityAccepted);
                sp.state = BindingState::Bound;
                BindingOutcome::Bound { session_id: id_hex.to_owned() }
            }
            Err(e) => {
                sp.state = BindingState::Rejected;
                BindingOutcome::Rejected(e)
            }
        }
    }
}
