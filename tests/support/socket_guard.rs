//! Skips wiremock-backed tests in sandboxes that forbid loopback sockets.
//!
//! CI sets `PAPERFETCH_REQUIRE_SOCKET_TESTS=1` so a missing socket fails
//! loudly instead of silently skipping.

use std::net::TcpListener;
use std::panic::Location;
use std::sync::OnceLock;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "PAPERFETCH_REQUIRE_SOCKET_TESTS";

fn loopback_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| TcpListener::bind(("127.0.0.1", 0)).is_ok())
}

fn skipping_forbidden() -> bool {
    std::env::var(REQUIRE_ENV).is_ok_and(|value| {
        let value = value.trim().to_ascii_lowercase();
        value == "1" || value == "true" || value == "yes"
    })
}

/// Starts a mock server, or returns `None` when loopback is unavailable.
///
/// # Panics
///
/// Panics instead of skipping when the require env var is set.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl std::future::Future<Output = Option<MockServer>> {
    let caller = Location::caller();
    let available = loopback_available();
    if !available {
        assert!(
            !skipping_forbidden(),
            "loopback bind failed at {}:{} and {REQUIRE_ENV} is set",
            caller.file(),
            caller.line()
        );
        eprintln!(
            "skipping {}:{}: cannot bind 127.0.0.1 (set {REQUIRE_ENV}=1 to fail instead)",
            caller.file(),
            caller.line()
        );
    }
    async move {
        if available {
            Some(MockServer::start().await)
        } else {
            None
        }
    }
}
