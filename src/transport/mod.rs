//! Client-facing transports

pub mod unix_socket;
