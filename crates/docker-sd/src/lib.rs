//! Prometheus Docker service discovery agent
//!
//! HTTP surface and configuration for the `prometheus-docker-sd` binary.

pub mod api;
pub mod config;
