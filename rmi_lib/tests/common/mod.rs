use std::net::TcpListener;

use rmi_lib::EndpointAddress;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A loopback address nothing is listening on.
#[allow(dead_code)]
pub fn dead_address() -> EndpointAddress {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    EndpointAddress::new("127.0.0.1", port)
}
