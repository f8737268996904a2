pub mod compactor;
pub mod config;
pub mod engine;
pub mod error;
pub mod limits;
pub mod model;
pub mod observability;
pub mod registry;
pub mod repository;
pub mod store;
pub mod time_range;
pub mod wal;
