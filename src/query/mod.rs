// Query execution

pub mod engine;
