pub mod config;
pub mod timestamp;
pub mod types;

type Result<T> = anyhow::Result<T>;
