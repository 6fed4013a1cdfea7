// Library root: re-exports all modules so integration tests and the binary
// share the same public API.

pub mod api;
pub mod config;
pub mod db;
pub mod espn;
pub mod poller;
