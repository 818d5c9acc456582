use clap::Parser;
use rmi_lib::{EndpointAddress, RmiError, Stub};

use rmi_demo::{init_logging, Adder, ADDER_PORT};

/// Calls the toy adder.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value_t = EndpointAddress::new("localhost", ADDER_PORT))]
    address: EndpointAddress,

    a: i32,
    b: i32,
}

#[tokio::main]
async fn main() -> Result<(), RmiError> {
    init_logging();
    let args = Args::parse();

    let adder = Stub::<dyn Adder>::from_address(args.address);
    println!("{}", adder.add(args.a, args.b).await?);
    adder.disp(args.a).await?;
    println!("{}", adder.play().await?);
    match adder.thrower().await {
        Ok(value) => println!("thrower returned {value}"),
        Err(e) => println!("thrower failed: {e}"),
    }
    Ok(())
}
