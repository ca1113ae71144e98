// TwitchStatClips - Library root

pub mod config;
pub mod error;
pub mod auth;
pub mod helix;
pub mod models;
pub mod cache;
pub mod clips;
pub mod db;
pub mod stats;
pub mod session;
pub mod download;
pub mod middleware;
pub mod routes;
