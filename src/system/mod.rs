//! Host provisioning helpers: OS packages and service accounts.

mod account;
mod package;

pub use account::ensure_account;
pub use package::install_command;
