//! Tandem - Conversation Hand-off Coordinator
//!
//! This crate coordinates control of customer conversations shared between
//! an AI assistant and human operators: take-over, operator messaging,
//! release, and automatic expiry of manual holds.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
