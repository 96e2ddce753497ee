pub mod bind_merge;
pub mod error_scope;
