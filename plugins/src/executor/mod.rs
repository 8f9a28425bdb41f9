pub mod strategies;

pub use strategies::{ExponentialBackoffPlugin, ImmediateRetryPlugin, LinearRetryPlugin};
