use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use lantern_log::server::{run_secondary, SecondaryOptions};

fn print_help() {
    eprintln!(
        "\
lantern-log-secondary

USAGE:
  lantern-log-secondary --log-key <path> --backend-url <url> \\
      --primary-url <url> --primary-key <hex> [options]

REQUIRED:
  --log-key <path>        File with the hex-encoded Ed25519 seed
  --backend-url <url>     Base URL of the local Merkle storage node
  --primary-url <url>     Primary node to replicate from
  --primary-key <hex>     Primary node's public key

OPTIONS:
  --listen-addr <addr>    Listen address (default: 127.0.0.1:6966)
  --tree-id <n>           Merkle tree id at the storage node (default: 0)
  --prefix <string>       URL path prefix, no slashes (default: none)
  --interval <seconds>    Replication interval (default: 30)
  --deadline <seconds>    Per-request deadline (default: 10)
  --max-range <n>         Leaves fetched per replication batch (default: 512)
"
    );
}

fn parse_options(args: &[String]) -> anyhow::Result<SecondaryOptions> {
    let mut log_key: Option<PathBuf> = None;
    let mut backend_url: Option<String> = None;
    let mut primary_url: Option<String> = None;
    let mut primary_key: Option<String> = None;
    let mut listen_addr: SocketAddr = "127.0.0.1:6966".parse().unwrap();
    let mut tree_id: i64 = 0;
    let mut prefix = String::new();
    let mut interval = Duration::from_secs(30);
    let mut deadline = Duration::from_secs(10);
    let mut max_range: u64 = 512;

    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("{flag} requires a value"))
        };
        match flag.as_str() {
            "--log-key" => log_key = Some(PathBuf::from(value()?)),
            "--backend-url" => backend_url = Some(value()?),
            "--primary-url" => primary_url = Some(value()?),
            "--primary-key" => primary_key = Some(value()?),
            "--listen-addr" => listen_addr = value()?.parse()?,
            "--tree-id" => tree_id = value()?.parse()?,
            "--prefix" => prefix = value()?,
            "--interval" => interval = Duration::from_secs(value()?.parse()?),
            "--deadline" => deadline = Duration::from_secs(value()?.parse()?),
            "--max-range" => max_range = value()?.parse()?,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown flag: {other}"),
        }
    }

    Ok(SecondaryOptions {
        listen_addr,
        backend_url: backend_url.ok_or_else(|| anyhow::anyhow!("--backend-url is required"))?,
        key_file: log_key.ok_or_else(|| anyhow::anyhow!("--log-key is required"))?,
        primary_url: primary_url.ok_or_else(|| anyhow::anyhow!("--primary-url is required"))?,
        primary_key: primary_key.ok_or_else(|| anyhow::anyhow!("--primary-key is required"))?,
        tree_id,
        prefix,
        interval,
        deadline,
        max_range,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parse_options(&args).map_err(|e| {
        print_help();
        e
    })?;
    run_secondary(options).await
}
