pub mod otp;
pub mod reset_token;
pub mod user;

pub use otp::{OtpRecord, MAX_OTP_ATTEMPTS};
pub use reset_token::ResetTokenRecord;
pub use user::{AuthProvider, User, UserResponse};
