pub mod api_key;
pub mod password;

pub use api_key::{constant_time_eq, generate_api_key};
pub use password::{hash_password, verify_password};
