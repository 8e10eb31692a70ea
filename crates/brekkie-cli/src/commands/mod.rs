pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod config;
pub mod favorites;
pub mod migrate;
pub mod plan;
pub mod profile;
pub mod recipes;
