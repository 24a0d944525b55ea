#![forbid(unsafe_code)]

pub mod broadcast;
pub mod cache;
pub mod cli;
pub mod config;
pub mod consumers;
pub mod flatten;
pub mod formats;
pub mod logging;
pub mod order;
pub mod service;
pub mod show;
pub mod source;
