pub mod extractor;
pub mod password;
pub mod tokens;

pub use extractor::{CurrentUser, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
pub use tokens::{TokenPair, TokenService};
