pub mod app;
pub mod config;
pub mod ip;
pub mod lookup;
pub mod map;
pub mod record;
pub mod store;
pub mod worker;
