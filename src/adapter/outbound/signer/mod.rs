//! External signing helper adapter.

pub mod command;
pub mod token;

pub use command::CommandSigner;
pub use token::HelperTokenContract;
