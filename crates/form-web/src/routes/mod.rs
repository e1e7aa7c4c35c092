pub mod admin;
pub mod auth;
pub mod meta;
pub mod public;
