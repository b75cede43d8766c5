pub mod session;

pub use session::{current_session, CookiePreferences};
