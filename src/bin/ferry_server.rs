use std::{error::Error, net::SocketAddr, path::PathBuf, process, sync::Arc};

use clap::Parser;
use ferry::{FileServer, MemoryFiles};
use log::info;

#[derive(Debug, Parser)]
struct Cli {
    /// Listen for new connections at address
    address: SocketAddr,
    /// Seed the store from this directory's files
    #[arg(long)]
    seed: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let store = Arc::new(MemoryFiles::new());
    if let Some(dir) = &cli.seed {
        store.seed_dir(dir)?;
    }
    MemoryFiles::spawn_completer(&store);

    ctrlc::set_handler(|| {
        info!("shutting down");
        process::exit(0);
    })?;

    let server = FileServer::new(cli.address, store);
    server.listen()?;
    Ok(())
}
