// Integration test module organization

pub mod common;

mod backend_test;
mod cache_behavior_test;
mod provisioning_test;
