// Game logic. Nothing in here knows how things are stored.
pub mod calendar;
pub mod competition;
pub mod competitor;
pub mod config;
pub mod email;
pub mod error;
pub mod io;
pub mod storage;
pub mod time;
pub mod transfer;
pub mod types;
