pub mod clock;
pub mod extractor;
pub mod jwt;
pub mod otp;
pub mod test_utils;
