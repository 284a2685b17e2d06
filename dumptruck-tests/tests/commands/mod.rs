//! Command tests for dumptruck
//!
//! Drive the library against the fake dump tool and fake rclone scripts from
//! `test_utils`, with wiremock standing in for Swift and the push gateway.

#![cfg(unix)]

mod list;
mod restore;
mod run;
