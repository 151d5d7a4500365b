//! Local browser for test dumps named `test.date.type`.
//!
//! The catalog is rebuilt from the directory on every request; viewers are
//! picked by dump type from a registry filled at startup.

pub mod catalog;
pub mod config;
pub mod dump;
pub mod logging;
pub mod nav;
pub mod page;
pub mod server;
pub mod viewer;
