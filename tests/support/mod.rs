//! Helpers shared by integration tests.

#![allow(dead_code)]

pub mod ftp_server;
pub mod socket_guard;
