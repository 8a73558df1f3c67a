//! SOCKS5 protocol handling for Sockrelay
//!
//! The wire codec, authentication negotiator, request resolver, relay
//! engine and the per-connection session state machine that ties them
//! together.

pub mod auth;
pub mod codec;
pub mod consts;
pub mod relay;
pub mod resolver;
pub mod session;
pub mod types;

pub use auth::{negotiate, select_auth_method, AuthMethod};
pub use relay::{relay, RelayEnd, RelayOptions, RelayOutcome};
pub use resolver::{validate_command, Connector, Resolver, SystemResolver};
pub use session::{Session, Stage};
pub use types::{AddressSpec, RequestHeader, SocksCommand};
