//! Integration tests for the event bus, its transports and its consumers.

mod chain;
mod consumer;
mod infrastructure;
mod pass_through;
mod support;
