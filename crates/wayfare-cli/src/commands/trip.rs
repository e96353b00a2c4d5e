use wayfare_core::{collections, RecordKind};

use crate::cli::TripCommands;
use crate::commands::common::{build_candidate, join_words, print_records, CliContext, StoreMode};
use crate::error::CliError;

pub fn run_trip(context: &CliContext, command: TripCommands) -> Result<(), CliError> {
    match command {
        TripCommands::Add {
            city,
            title,
            price,
            img,
        } => {
            let candidate = build_candidate(
                None,
                join_words(&city),
                title,
                price,
                img,
                RecordKind::Trip,
            )?;
            let store = context.open_store(StoreMode::Local)?;
            let trip = store.upsert(collections::CREATED_TRIPS, candidate);
            println!("{}", trip.id);
            Ok(())
        }
        TripCommands::List { json } => {
            let store = context.open_store(StoreMode::Local)?;
            print_records(&store.list(collections::CREATED_TRIPS), json)
        }
    }
}
