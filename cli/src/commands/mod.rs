pub mod cli;
pub mod idle;
pub mod plan;
pub mod run;
