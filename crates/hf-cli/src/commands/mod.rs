//! Command implementations for the hotfix CLI

pub mod apply;
pub mod check;
pub mod serve;
pub mod symbols;

pub use apply::apply_command;
pub use check::check_command;
pub use serve::serve_command;
pub use symbols::symbols_command;
