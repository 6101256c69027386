//! Core domain + application logic for the task bot.
//!
//! This crate is framework-agnostic. Telegram lives behind the
//! [`messaging::port::MessagingPort`] trait, implemented in the adapter crate.

pub mod audit;
pub mod callback;
pub mod config;
pub mod domain;
pub mod drafts;
pub mod errors;
pub mod extract;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod render;
pub mod security;
pub mod service;
pub mod store;
pub mod task;

pub use errors::{Error, Result};
