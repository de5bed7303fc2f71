//! Send one command to a running hub and print the reply
//!
//! ```text
//! hubctl FX PRESET SET SB7_CLASSIC
//! hubctl --addr 192.168.4.1:5050 STATUS
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use oraclebox_hub::constants::DEFAULT_COMMAND_PORT;

#[derive(Parser)]
#[command(name = "hubctl", about = "Send a command to the OracleBox hub", version)]
struct Cli {
    /// Hub command address (host:port)
    #[arg(short, long, default_value_t = format!("127.0.0.1:{}", DEFAULT_COMMAND_PORT))]
    addr: String,

    /// Seconds to wait for the reply
    #[arg(short, long, default_value = "10")]
    timeout: u64,

    /// Command words, e.g. `FX SET BP_LOW 700`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let line = cli.command.join(" ");

    let reply = tokio::time::timeout(Duration::from_secs(cli.timeout), send(&cli.addr, &line))
        .await
        .context("timed out waiting for the hub")??;

    println!("{}", reply);
    if reply.starts_with("ERR") {
        std::process::exit(1);
    }
    Ok(())
}

async fn send(addr: &str, line: &str) -> Result<String> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connecting to {}", addr))?;
    let (read, mut write) = stream.into_split();

    write.write_all(format!("{}\n", line).as_bytes()).await?;

    let mut reply = String::new();
    BufReader::new(read).read_line(&mut reply).await?;
    if reply.is_empty() {
        bail!("hub closed the connection without replying");
    }
    Ok(reply.trim_end().to_string())
}
