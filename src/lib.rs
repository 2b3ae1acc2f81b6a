pub mod clock;
pub mod config;
pub mod dom;
pub mod error;
pub mod listing;
pub mod net;
pub mod prefetch;
pub mod publish;

#[cfg(test)]
mod testing;
