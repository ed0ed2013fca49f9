//! Credentials, bearer tokens and the request identity they resolve to.

pub mod gate;
pub mod identity;
pub mod password;
pub mod token;

pub use gate::{GateError, require_activated, require_permissions};
pub use identity::{BearerError, Identity, parse_authorization};
pub use password::{CredentialError, HashParams, Password};
pub use token::{Token, TokenError, TokenScope};
