pub mod password;
pub mod registration;
pub mod session;
pub mod social;

pub use password::{forgot_password, reset_password};
pub use registration::{send_otp, verify_otp_register};
pub use session::{login, logout};
pub use social::google_login;
