use crate::cli::CollectionArg;
use crate::commands::common::{normalize_record_id, CliContext, StoreMode};
use crate::error::CliError;

pub fn run_remove(context: &CliContext, collection: CollectionArg, id: &str) -> Result<(), CliError> {
    let id = normalize_record_id(id)?;
    let store = context.open_store(StoreMode::Local)?;

    if !store.remove(collection.key(), &id) {
        return Err(CliError::RecordNotFound {
            collection: collection.key().to_string(),
            id,
        });
    }

    println!("Removed {id}");
    Ok(())
}
