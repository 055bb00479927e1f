use clap::Args as ClapArgs;
use std::path::PathBuf;

use crate::config::Config;

/// Storage location override shared by the commands that touch saved colors.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Directory holding the saved colors (overrides storage.data_dir)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl StoreArgs {
    pub fn apply(&self, config: Config) -> Config {
        match &self.data_dir {
            Some(dir) => config.with_data_dir(dir.clone()),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_args_override_data_dir_only_when_given() {
        let config = Config::default();
        let default_dir = config.storage.data_dir.clone();

        let unchanged = StoreArgs::default().apply(config.clone());
        assert_eq!(unchanged.storage.data_dir, default_dir);

        let args = StoreArgs {
            data_dir: Some(PathBuf::from("/tmp/atg-data")),
        };
        assert_eq!(
            args.apply(config).storage.data_dir,
            PathBuf::from("/tmp/atg-data")
        );
    }
}
