//! Interfaces and server objects shared by the demo binaries.

use std::sync::Arc;

use rmi_lib::{remote_impl, remote_interface, RmiError, Skeleton, Stub};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const PINGPONG_PORT: u16 = 9000;
pub const ADDER_PORT: u16 = 9001;

/// Logs to stderr, filtered by `RUST_LOG` (`info` when unset).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[remote_interface]
pub trait PingPongServer {
    async fn ping(&self, id: i32) -> Result<String, RmiError>;
}

/// Hands out one freshly started [`PingPongServer`] per call.
#[remote_interface]
pub trait PingPongFactory {
    async fn make_server(&self) -> Result<Stub<dyn PingPongServer>, RmiError>;
}

pub struct PingPong;

#[remote_impl]
impl PingPongServer for PingPong {
    async fn ping(&self, id: i32) -> Result<String, RmiError> {
        Ok(format!("Pong {id}"))
    }
}

pub struct Factory {
    /// Host put into the stubs handed out, when clients cannot reach the
    /// servers at the address they are bound to.
    advertise_host: Option<String>,
    servers: Mutex<Vec<Skeleton<dyn PingPongServer>>>,
}

impl Factory {
    #[must_use]
    pub fn new(advertise_host: Option<String>) -> Self {
        Self {
            advertise_host,
            servers: Mutex::new(Vec::new()),
        }
    }

    /// Stops every server made so far and waits for them to finish.
    pub async fn shutdown(&self) {
        let servers = std::mem::take(&mut *self.servers.lock().await);
        for server in &servers {
            server.stop();
        }
        for server in &servers {
            server.join().await;
        }
    }
}

#[remote_impl]
impl PingPongFactory for Factory {
    async fn make_server(&self) -> Result<Stub<dyn PingPongServer>, RmiError> {
        let skeleton = Skeleton::<dyn PingPongServer>::new(Arc::new(PingPong));
        skeleton.start().await?;
        let stub = match &self.advertise_host {
            Some(host) => Stub::from_skeleton_with_hostname(&skeleton, host)?,
            None => Stub::from_skeleton(&skeleton)?,
        };
        tracing::info!("made {stub}");
        self.servers.lock().await.push(skeleton);
        Ok(stub)
    }
}

#[remote_interface]
pub trait Adder {
    async fn add(&self, a: i32, b: i32) -> Result<i32, RmiError>;
    async fn thrower(&self) -> Result<i32, RmiError>;
    async fn disp(&self, a: i32) -> Result<(), RmiError>;
    async fn play(&self) -> Result<i32, RmiError>;
}

pub struct ToyAdder;

#[remote_impl]
impl Adder for ToyAdder {
    async fn add(&self, a: i32, b: i32) -> Result<i32, RmiError> {
        a.checked_add(b)
            .ok_or_else(|| RmiError::other(format!("{a} + {b} overflows")))
    }
    async fn thrower(&self) -> Result<i32, RmiError> {
        Err(RmiError::other("File problems"))
    }
    async fn disp(&self, a: i32) -> Result<(), RmiError> {
        println!("{a}");
        Ok(())
    }
    async fn play(&self) -> Result<i32, RmiError> {
        Ok(42)
    }
}
