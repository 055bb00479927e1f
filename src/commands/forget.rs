use anyhow::{Context, Result};
use clap::Args as ClapArgs;

use crate::commands::common::StoreArgs;
use crate::config::Config;
use crate::store::{ColorStore, RemoveOutcome};

#[derive(ClapArgs)]
pub struct Args {
    /// Id of the group whose color should be deleted
    pub group_id: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

pub async fn execute(args: Args, config: Config) -> Result<()> {
    let config = args.store.apply(config);
    let store = ColorStore::from_config(&config);

    let outcome = store
        .remove(&args.group_id)
        .await
        .with_context(|| format!("Failed to remove color of group {}", args.group_id))?;

    match outcome {
        RemoveOutcome::Removed => println!("Removed saved color of group {}", args.group_id),
        RemoveOutcome::NotPresent => println!("No saved color for group {}", args.group_id),
        RemoveOutcome::NoData => println!("No saved group colors"),
    }
    Ok(())
}
