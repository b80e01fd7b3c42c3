//! Node settings from node.toml
//!
//! Generated by the build script after validation.

include!(concat!(env!("OUT_DIR"), "/node_config.rs"));
