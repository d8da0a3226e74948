pub mod password;
pub mod validation;

pub use password::{Argon2Hasher, Password, PasswordHasher, MIN_PASSWORD_LENGTH};
pub use validation::{is_valid_email, is_valid_password, normalize_email, ValidatedJson};
