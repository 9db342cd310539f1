pub mod auth;
pub mod db;

pub use auth::{build_auth_provider, NativeTokenAuth, WebSessionAuth};
pub use db::DbAdapter;
