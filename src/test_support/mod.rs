#[path = "../../tests/support/socket_guard.rs"]
pub mod socket_guard;
pub mod sources;
