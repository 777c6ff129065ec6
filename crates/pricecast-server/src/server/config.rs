use anyhow::bail;
use clap::Parser;
use core::time::Duration;

/// Runtime configuration for the `pricecast-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first). The defaults listen on port 4444 and emit one price
/// per second.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pricecast-server",
    version,
    about = "Streams synthetic price updates over Server-Sent Events"
)]
pub struct CliArgs {
    /// TCP address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:4444"))]
    pub server_addr: String,

    /// Milliseconds between two generated prices on a stream.
    ///
    /// Environment variable: `TICK_INTERVAL_MS`
    #[arg(long, env = "TICK_INTERVAL_MS", default_value_t = 1_000)]
    pub tick_interval_ms: u64,

    /// Capacity in bytes of the pipe between the stream writer and the HTTP
    /// response body.
    ///
    /// Once full, the writer waits for hyper to hand bytes to the socket, so
    /// a slow client slows its own generator down and nothing else.
    ///
    /// Environment variable: `WRITE_BUFFER_BYTES`
    #[arg(long, env = "WRITE_BUFFER_BYTES", default_value_t = 4096)]
    pub write_buffer_bytes: usize,

    /// Seconds to wait for open streams to end on their own before they are
    /// cancelled during shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub tick_interval: Duration,
    pub write_buffer_bytes: usize,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.tick_interval_ms == 0 {
            bail!("TICK_INTERVAL_MS must be greater than 0");
        }

        if args.write_buffer_bytes == 0 {
            bail!("WRITE_BUFFER_BYTES must be greater than 0");
        }

        Ok(Self {
            server_addr: args.server_addr,
            tick_interval: Duration::from_millis(args.tick_interval_ms),
            write_buffer_bytes: args.write_buffer_bytes,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: String::from("0.0.0.0:4444"),
            tick_interval: Duration::from_secs(1),
            write_buffer_bytes: 4096,
            shutdown_timeout: Duration::from_secs(3),
        }
    }
}
