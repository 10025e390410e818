mod credentials;
mod slot;
mod state;

pub use credentials::{CookieRecord, Credentials};
pub use slot::SessionSlot;
pub use state::{SessionState, SessionStatus, StatusSnapshot, login_backoff};
