pub mod connection;
pub mod models;
pub mod pattern;
pub mod settings;
