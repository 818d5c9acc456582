use std::sync::Arc;

use clap::Parser;
use rmi_lib::{EndpointAddress, RmiError, Skeleton};

use rmi_demo::{init_logging, Factory, PingPongFactory, PINGPONG_PORT};

/// Serves a ping-pong factory; every client asks it for its own server.
#[derive(Parser, Debug)]
struct Args {
    /// Address the factory listens on.
    #[arg(long, default_value_t = EndpointAddress::new("0.0.0.0", PINGPONG_PORT))]
    address: EndpointAddress,

    /// Host name put into the server stubs the factory hands out.
    #[arg(long)]
    advertise_host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), RmiError> {
    init_logging();
    let args = Args::parse();

    let factory = Arc::new(Factory::new(args.advertise_host));
    let skeleton = Skeleton::<dyn PingPongFactory>::with_address(factory.clone(), args.address);
    skeleton.start().await?;
    if let Some(address) = skeleton.address() {
        println!("Skeleton running at address: {address}");
    }

    skeleton.join().await;
    factory.shutdown().await;
    Ok(())
}
