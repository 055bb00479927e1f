use anyhow::Result;
use clap::Args as ClapArgs;

use crate::commands::common::StoreArgs;
use crate::config::Config;
use crate::store::ColorStore;

#[derive(ClapArgs)]
pub struct Args {
    /// Print the mapping as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub store: StoreArgs,
}

pub async fn execute(args: Args, config: Config) -> Result<()> {
    let config = args.store.apply(config);
    let colors = ColorStore::from_config(&config).load().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&colors)?);
        return Ok(());
    }

    if colors.is_empty() {
        println!(
            "No saved group colors in {}",
            config.storage.data_dir.display()
        );
        return Ok(());
    }

    for (group, color) in &colors {
        println!("{:<32} {}", group, color);
    }
    Ok(())
}
