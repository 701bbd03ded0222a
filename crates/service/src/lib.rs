//! HTTP surface and configuration for the load analytics service

pub mod api;
pub mod config;
