//! TCP entry points for controllers

pub mod command;
pub mod listener;

pub use command::CommandServer;
