/// Authentication module
///
/// Access token signing/parsing, refresh token records, and the lifecycle
/// manager that rotates and revokes session chains.

mod claims;
mod jwt;
mod lifecycle;
mod password;
mod refresh_token;
mod session;

pub use claims::Claims;
pub use jwt::{ClaimsEncoder, ParsedToken};
pub use lifecycle::{TokenLifecycleManager, TokenPair};
pub use password::{hash_password, verify_password};
pub use refresh_token::{generate_refresh_token, hash_token, RefreshTokenRecord};
pub use session::SessionId;
