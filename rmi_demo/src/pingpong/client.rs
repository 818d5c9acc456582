use clap::Parser;
use rmi_lib::{EndpointAddress, RmiError, Stub};

use rmi_demo::{init_logging, PingPongFactory, PingPongServer, PINGPONG_PORT};

/// Asks the factory for a ping-pong server and pings it.
#[derive(Parser, Debug)]
struct Args {
    /// Address of the factory.
    #[arg(long, default_value_t = EndpointAddress::new("localhost", PINGPONG_PORT))]
    address: EndpointAddress,

    /// Number of pings to send.
    #[arg(long, default_value_t = 4)]
    count: i32,
}

#[tokio::main]
async fn main() -> Result<(), RmiError> {
    init_logging();
    let args = Args::parse();

    let factory = Stub::<dyn PingPongFactory>::from_address(args.address);
    let server = factory.make_server().await?;
    tracing::info!("got {server}");

    for id in 0..args.count {
        println!("{}", server.ping(id).await?);
    }
    Ok(())
}
