use std::sync::Arc;

use clap::Parser;
use rmi_lib::{EndpointAddress, RmiError, Skeleton};

use rmi_demo::{init_logging, Adder, ToyAdder, ADDER_PORT};

/// Serves the toy adder.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value_t = EndpointAddress::new("localhost", ADDER_PORT))]
    address: EndpointAddress,
}

#[tokio::main]
async fn main() -> Result<(), RmiError> {
    init_logging();
    let args = Args::parse();

    let skeleton = Skeleton::<dyn Adder>::with_address(Arc::new(ToyAdder), args.address);
    skeleton.start().await?;
    println!("Skeleton Started");

    skeleton.join().await;
    Ok(())
}
