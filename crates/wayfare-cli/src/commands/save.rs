use wayfare_core::CandidateRecord;

use crate::cli::CollectionArg;
use crate::commands::common::{CliContext, StoreMode};
use crate::error::CliError;

pub async fn run_save(
    context: &CliContext,
    collection: CollectionArg,
    candidate: CandidateRecord,
) -> Result<(), CliError> {
    let store = context.open_store(StoreMode::Mirrored)?;
    let record = store.save(collection.key(), candidate);
    println!("{}", record.id);

    // The process exits right after this, so wait for the mirror here.
    store.flush_mirror().await;
    if let Some(server_id) = store
        .get(collection.key(), &record.id)
        .and_then(|saved| saved.server_id())
    {
        tracing::info!("Saved '{}' on the server as {}", record.id, server_id);
    }
    Ok(())
}
