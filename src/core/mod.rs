//! Core session, lifecycle and scan logic

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod generation;
pub mod lifecycle;
pub mod scan;
pub mod service;
pub mod session;
pub mod types;
