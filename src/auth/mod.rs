//! OAuth credential, scope, and token lifecycle.
//!
//! Split into:
//! - scopes: the three named permission levels
//! - token: the cached token record
//! - store: on-disk layout and atomic persistence
//! - flow: token-endpoint exchange, consent URL, redirect listener, manual paste
//! - manager: the state machine tied together (check_setup / authorize /
//!   get_valid_token / set_scope)

pub mod flow;
pub mod manager;
pub mod scopes;
pub mod store;
pub mod token;

pub use flow::{HttpTokenExchanger, TokenExchanger, TokenResponse};
pub use manager::{CredentialManager, SetupStatus};
pub use scopes::{Scope, DEFAULT_SCOPE};
pub use store::CredentialStore;
pub use token::TokenRecord;
