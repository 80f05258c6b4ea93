//! Request middleware: authentication and role policy

pub mod auth;
pub mod policy;

pub use auth::{auth_middleware, issue_token, AuthUser, Claims, CurrentUser};
pub use policy::{authorize, Command};
