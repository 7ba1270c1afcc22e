mod principal;
mod request;
mod token;

pub use principal::{Principal, Role};
pub use request::SessionRequest;
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
