use wayfare_core::RecordStore;

use crate::cli::CollectionArg;
use crate::commands::common::{format_record_lines, CliContext, StoreMode};
use crate::error::CliError;

/// Print `collection` now and again after every change, from this process or
/// any other process using the same database, until Ctrl-C.
pub async fn run_watch(context: &CliContext, collection: CollectionArg) -> Result<(), CliError> {
    let store = context.open_store(StoreMode::Local)?;
    let key = collection.key();
    print_snapshot(&store, key);

    let (changed_tx, mut changed_rx) = tokio::sync::mpsc::unbounded_channel();
    let subscription = store.subscribe(key, move || {
        let _ = changed_tx.send(());
    });

    loop {
        tokio::select! {
            changed = changed_rx.recv() => {
                if changed.is_none() {
                    break;
                }
                // Several writes may land between two prints; one re-read covers them.
                while changed_rx.try_recv().is_ok() {}
                print_snapshot(&store, key);
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    subscription.unsubscribe();
    Ok(())
}

fn print_snapshot(store: &RecordStore, collection: &str) {
    let records = store.list(collection);
    println!("-- {collection} ({} records)", records.len());
    for line in format_record_lines(&records) {
        println!("{line}");
    }
}
