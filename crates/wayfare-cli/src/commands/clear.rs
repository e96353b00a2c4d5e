use crate::cli::CollectionArg;
use crate::commands::common::{CliContext, StoreMode};
use crate::error::CliError;

pub fn run_clear(context: &CliContext, collection: CollectionArg) -> Result<(), CliError> {
    let store = context.open_store(StoreMode::Local)?;
    store.clear(collection.key());
    println!("Cleared {}", collection.key());
    Ok(())
}
