pub mod action;
pub mod decompose;
pub mod executor;
pub mod factory;
pub mod idle;
