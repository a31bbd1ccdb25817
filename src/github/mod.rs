pub mod client;
pub mod models;

pub use client::{DefaultGithubClient, GithubClient, DEFAULT_API_BASE};
pub use models::*;
