//! OpenID Connect login for the browser
//!
//! This module groups everything needed to authenticate a browser against
//! an external identity provider with the authorization code flow:
//!
//! - [`state`]: anti-forgery values tying a callback to the login that started it
//! - [`discovery`]: provider endpoint discovery
//! - [`jwks`]: the provider's signing keys
//! - [`provider`]: authorization redirect, code exchange and token verification
//! - [`claims`]: the verified identity as a map of claims
//! - [`session`]: server-side sessions referenced from an encrypted cookie
//! - [`logout`]: the provider logout redirect
//! - [`error`]: failure taxonomy and its HTTP mapping

pub mod claims;
pub mod discovery;
pub mod error;
pub mod jwks;
pub mod logout;
pub mod provider;
pub mod session;
pub mod state;

pub use claims::{ClaimValue, Claims};
pub use error::{AuthError, ErrorMessage};
pub use provider::{OidcProvider, ProviderSettings, ProviderSource, TokenSet};
pub use session::{MemorySessionStore, Session, SessionManager, SessionStore};
