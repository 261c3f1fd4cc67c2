//! Database models split into domain-specific modules.

pub mod product;
pub mod session;
pub mod user;

pub use product::*;
pub use session::*;
pub use user::*;
