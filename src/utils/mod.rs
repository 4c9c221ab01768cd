pub mod auth;
pub mod flash;

pub use auth::{create_token, hash_password, verify_password, verify_token, Claims};
pub use flash::{flash_error, flash_success, take_flash, Flash, FlashKind};
