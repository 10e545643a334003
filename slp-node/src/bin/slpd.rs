use std::path::PathBuf;

use clap::Parser;

use slp_node::{run, Settings};

/// Side Ledger Protocol indexer node.
#[derive(Parser, Debug)]
#[command(name = "slpd", version, about)]
struct Args {
    /// Network name, matching `{name}.json` in the data folder.
    #[arg(long, env = "SLP_NETWORK", default_value = "sxp")]
    network: String,

    /// Folder holding configs, key files and the database.
    #[arg(long, env = "SLP_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Address to bind the inbound HTTP surface on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 5200)]
    port: u16,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let settings = Settings {
        network: args.network,
        data_dir: args.data_dir,
        host: args.host,
        port: args.port,
    };
    if let Err(e) = run(settings).await {
        eprintln!("slpd: {e}");
        std::process::exit(1);
    }
}
