pub mod shell;

pub use shell::ShellAction;
