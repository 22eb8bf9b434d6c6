pub mod config;
pub mod domain;

pub use domain::nickname::{NicknameRecord, ScopeId, UserId, PRIVATE_SCOPE};
