use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use lantern_log::server::{run_primary, PrimaryOptions, DEFAULT_DOH_URL};

fn print_help() {
    eprintln!(
        "\
lantern-log-primary

USAGE:
  lantern-log-primary --log-key <path> --backend-url <url> [options]

REQUIRED:
  --log-key <path>        File with the hex-encoded Ed25519 seed
  --backend-url <url>     Base URL of the Merkle storage node

OPTIONS:
  --listen-addr <addr>    Listen address (default: 127.0.0.1:6965)
  --tree-id <n>           Merkle tree id at the storage node (default: 0)
  --prefix <string>       URL path prefix, no slashes (default: none)
  --interval <seconds>    Tree-head rotation interval (default: 30)
  --deadline <seconds>    Per-request deadline (default: 10)
  --max-range <n>         Max leaves per get-leaves response (default: 512)
  --shard-start <n>       Smallest accepted shard hint (default: 0)
  --witnesses <path>      File of 'key_hash public_key' hex pairs
  --state-file <path>     Where to persist the to-sign tree head
  --secondary-url <url>   Secondary node to gate rotation on
  --secondary-key <hex>   Secondary node's public key (with --secondary-url)
  --doh-url <url>         DNS-over-HTTPS resolver for domain hints
"
    );
}

fn parse_options(args: &[String]) -> anyhow::Result<PrimaryOptions> {
    let mut log_key: Option<PathBuf> = None;
    let mut backend_url: Option<String> = None;
    let mut listen_addr: SocketAddr = "127.0.0.1:6965".parse().unwrap();
    let mut tree_id: i64 = 0;
    let mut prefix = String::new();
    let mut interval = Duration::from_secs(30);
    let mut deadline = Duration::from_secs(10);
    let mut max_range: u64 = 512;
    let mut shard_start: u64 = 0;
    let mut witness_file: Option<PathBuf> = None;
    let mut state_file: Option<PathBuf> = None;
    let mut secondary_url: Option<String> = None;
    let mut secondary_key: Option<String> = None;
    let mut doh_url = DEFAULT_DOH_URL.to_string();

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
            "--listen-addr" => listen_addr = value()?.parse()?,
            "--tree-id" => tree_id = value()?.parse()?,
            "--prefix" => prefix = value()?,
            "--interval" => interval = Duration::from_secs(value()?.parse()?),
            "--deadline" => deadline = Duration::from_secs(value()?.parse()?),
            "--max-range" => max_range = value()?.parse()?,
            "--shard-start" => shard_start = value()?.parse()?,
            "--witnesses" => witness_file = Some(PathBuf::from(value()?)),
            "--state-file" => state_file = Some(PathBuf::from(value()?)),
            "--secondary-url" => secondary_url = Some(value()?),
            "--secondary-key" => secondary_key = Some(value()?),
            "--doh-url" => doh_url = value()?,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown flag: {other}"),
        }
    }

    Ok(PrimaryOptions {
        listen_addr,
        backend_url: backend_url.ok_or_else(|| anyhow::anyhow!("--backend-url is required"))?,
        key_file: log_key.ok_or_else(|| anyhow::anyhow!("--log-key is required"))?,
        state_file,
        witness_file,
        secondary_url,
        secondary_key,
        doh_url,
        tree_id,
        prefix,
        interval,
        deadline,
        max_range,
        shard_start,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = parse_options(&args).map_err(|e| {
        print_help();
        e
    })?;
    run_primary(options).await
}
