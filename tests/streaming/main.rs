#![allow(clippy::wildcard_enum_match_arm)]
#![allow(dead_code)]

mod common;
mod config;
mod equivalence;
mod layout;
mod mini_batch;
mod native_bridge;
mod outer_join;
mod retention;
mod semi_anti;
