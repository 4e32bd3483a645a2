pub mod principal;
pub mod signing;

pub use principal::{ROLE_HEADER, USER_ID_HEADER};
pub use signing::{signature_validator, SIGNED_HEADERS};
