pub mod claims;
pub mod extractors;
pub mod jwt;
pub mod password;

pub use claims::Role;
pub use extractors::{AdminUser, AuthUser, RefreshUser};
pub use jwt::JwtKeys;
pub use password::{HashError, PasswordHasher};
