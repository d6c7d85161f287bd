#![deny(clippy::unwrap_used)]
#![allow(clippy::from_over_into)]

use anyhow::Context;
use log_error::LogError;
use once_cell::sync::Lazy;

pub mod catalog;
pub mod category;
pub mod import;
pub mod import_throttle;

pub static SELF_ADDR: Lazy<String> = Lazy::new(|| {
    envmnt::get_parse("SELF_ADDR")
        .context("SELF_ADDR not set")
        .log_error("Unable to get SELF_ADDR")
        .unwrap_or("0.0.0.0".to_string())
});
