pub mod api;
pub mod events;
pub mod export;
pub mod models;
