pub mod session_auth;
pub mod token_auth;

pub use session_auth::{session_auth_middleware, SessionContext};
pub use token_auth::{token_auth_middleware, TokenContext};
