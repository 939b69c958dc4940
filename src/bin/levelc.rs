use clap::Parser;

use assetc::cli::{LevelcCli, init_logging};

fn main() -> anyhow::Result<()> {
    let args = LevelcCli::parse();
    init_logging(args.verbose);
    assetc::levelc(&args)
}
