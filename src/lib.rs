pub mod app;
pub mod detail;
pub mod models;
pub mod omdb;
pub mod search;
pub mod session;
pub mod watched;
