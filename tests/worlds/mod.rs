//! Cucumber test worlds.
#![cfg(not(loom))]

pub mod relay;
