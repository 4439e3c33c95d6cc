pub mod session;

pub use session::SessionCookie;
