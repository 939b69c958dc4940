use clap::Parser;

use assetc::cli::{TilesetcCli, init_logging};

fn main() -> anyhow::Result<()> {
    let args = TilesetcCli::parse();
    init_logging(args.verbose);
    assetc::tilesetc(&args)
}
