//! Subcommand handlers.

pub(crate) mod checksum;
pub(crate) mod config;
pub(crate) mod demo;
pub(crate) mod keys;
pub(crate) mod log;
pub(crate) mod token;
