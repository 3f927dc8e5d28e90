//! Shared helpers for the integration test crates.

#![allow(dead_code)]
