#![deny(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::Parser;

/// Sphere-dynamics compute server.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    address: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8765)]
    port: u16,

    /// Outbound frame ring capacity per connection.
    #[arg(long, default_value_t = 60)]
    frame_buffer: u16,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    server::net::run(&args.address, args.port, args.frame_buffer)
}
