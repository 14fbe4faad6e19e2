//! Shared test helpers.

use axum::Router;
use std::net::SocketAddr;

/// Serve `router` on an ephemeral local port from a background thread with
/// its own runtime; the blocking clients under test run on the test thread.
pub fn spawn_mock(router: Router) -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router).await.unwrap();
        });
    });

    addr
}
