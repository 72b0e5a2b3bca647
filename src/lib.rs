//! Spam Scanner: classifies short messages and inbox contents as spam and
//! emails the verdict back to the user.

pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod mail;
pub mod report;
pub mod scanner;
