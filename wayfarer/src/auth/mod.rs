//! Password hashing and signed bearer tokens.

pub mod password;
pub mod tokens;

pub use password::Passwords;
pub use tokens::{Claims, TokenIssuer, TokenKind, TokenPair};
