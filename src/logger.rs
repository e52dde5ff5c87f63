// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Default logger configuration for the project

use std::env;

use tracing_subscriber::EnvFilter;

fn get_env() -> String {
    env::var("RUST_LOG").unwrap_or_default()
}

fn all_redns(level: &str) -> String {
    format!(",redns={level}")
}

/// appends redns debug to RUST_LOG
pub fn debug() {
    let mut rust_log = get_env();
    rust_log.push_str(&all_redns("debug"));
    logger(&rust_log);
}

/// appends redns info to RUST_LOG
pub fn default() {
    let mut rust_log = get_env();
    rust_log.push_str(&all_redns("info"));
    logger(&rust_log);
}

/// appends redns error to RUST_LOG
pub fn quiet() {
    let mut rust_log = get_env();
    rust_log.push_str(&all_redns("error"));
    logger(&rust_log);
}

/// only uses the RUST_LOG environment variable
pub fn env() {
    let rust_log = get_env();
    logger(&rust_log);
}

fn logger(config: &str) {
    let filter = EnvFilter::new(config.trim_start_matches(','));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .init();
}
