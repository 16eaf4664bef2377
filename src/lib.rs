/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
pub mod aaa;
pub mod application;

mod attrs;
pub use attrs::AttributeStore;

pub mod codec;
pub mod config;
pub mod kdf;

mod log_event;
pub use log_event::*;

pub mod proto;
pub mod result;
pub mod session;
pub mod store;
pub mod tls;

pub use crate::aaa::Aaa;
pub use crate::application::{AuthorityLayer, BindingReport, HandlerCommand, HandshakeMode};
pub use crate::config::AaaConfig;
pub use crate::result::Error;
pub use crate::session::{
    BindingOutcome, BindingState, ConnectionId, Context, Endpoint, SkipReason,
};
pub use crate::store::{SessionStore, UdpStore};
pub use crate::tls::{TlsCapabilities, TlsLayer, VerifyResult};
