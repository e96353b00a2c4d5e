use wayfare_core::api::BookingRequest;
use wayfare_core::{collections, CandidateRecord, RecordKind};

use crate::cli::CollectionArg;
use crate::commands::common::{normalize_record_id, parse_details, CliContext, StoreMode};
use crate::error::CliError;

/// Copy a record into the bookings collection, then tell the backend.
///
/// The local booking stands even if the backend is down.
pub async fn run_book(
    context: &CliContext,
    collection: CollectionArg,
    id: &str,
    details: &[String],
) -> Result<(), CliError> {
    let id = normalize_record_id(id)?;
    let details = parse_details(details)?;
    let store = context.open_store(StoreMode::Local)?;

    let source = store
        .get(collection.key(), &id)
        .ok_or_else(|| CliError::RecordNotFound {
            collection: collection.key().to_string(),
            id: id.clone(),
        })?;

    let mut candidate = CandidateRecord::new()
        .with_id(source.id.clone())
        .kind(RecordKind::Booking)
        .city(source.display_label.clone())
        .title(source.title.clone())
        .price(source.price_label.clone())
        .image(source.image_ref.clone());
    candidate.owner_id.clone_from(&source.owner_id);
    let booking = store.upsert(collections::BOOKINGS, candidate);

    let confirmed = match context.api_client()? {
        Some(client) => client
            .create_booking(&BookingRequest::for_record(&booking, details))
            .await
            .is_some(),
        None => false,
    };

    if confirmed {
        println!("Booked {} ({})", booking.display_label, booking.price_label);
    } else {
        println!(
            "Booked {} ({}) locally; the backend was not reached",
            booking.display_label, booking.price_label
        );
    }
    Ok(())
}
