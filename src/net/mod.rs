pub mod cache;
pub mod connection;
pub mod fetch;
pub mod link;
