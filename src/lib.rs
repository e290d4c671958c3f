pub mod browse;
pub mod cache;
pub mod config;
pub mod error;
pub mod image;
pub mod infinite;
pub mod models;
pub mod proxy;
pub mod queries;
pub mod tmdb;
pub mod watchlist;
