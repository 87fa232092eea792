//! NLB drain sidecar
//!
//! Watches the load balancer's view of this task and holds the task open
//! until the deregistration window has elapsed after draining begins.

pub mod bootstrap;
pub mod config;
pub mod controller;
pub mod error;
pub mod server;
