use crate::{
    config::Config,
    files::{content_hash, TrashDir},
    prelude::*,
};


#[derive(Debug, clap::Subcommand)]
pub(crate) enum TrashCommand {
    /// Checks whether a file with the given content hash is in the trash.
    Exists {
        hash: String,
    },

    /// Deletes the file with the given content hash from the trash.
    Delete {
        hash: String,
    },

    /// Prints the content hash of a local file.
    Hash {
        file: std::path::PathBuf,
    },
}

pub(crate) async fn run(cmd: &TrashCommand, config: &Config) -> Result<()> {
    let trash = TrashDir::from_config(&config.files);

    match cmd {
        TrashCommand::Exists { hash } => {
            if trash.contains(hash).await? {
                println!("{}", trash.path_of(hash)?.display());
            } else {
                bail!("no file with hash {hash} in '{}'", trash.root().display());
            }
        }
        TrashCommand::Delete { hash } => {
            if trash.delete(hash).await? {
                info!("Deleted {hash} from the trash");
            } else {
                warn!("No file with hash {hash} in the trash, nothing deleted");
            }
        }
        TrashCommand::Hash { file } => {
            let bytes = tokio::fs::read(file).await
                .with_context(|| format!("failed to read '{}'", file.display()))?;
            println!("{}", content_hash(&bytes));
        }
    }

    Ok(())
}
