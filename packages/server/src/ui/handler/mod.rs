mod session;

pub use session::{Session, spawn_session};
