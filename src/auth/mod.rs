pub mod credentials;
pub mod gate;
pub mod identity;
pub mod session;

pub use gate::AuthorizationGate;
pub use session::{AdminSession, LeaderSession, SessionStore, StudentSession};
