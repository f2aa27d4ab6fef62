mod auth;
mod health_check;

pub use auth::{
    current_session, login, refresh, revoke, session_history, AuthResponse, ChainEntry,
    SessionResponse,
};
pub use health_check::health_check;
