use crate::cli::{CollectionArg, SortOrder};
use crate::commands::common::{print_records, sort_records, CliContext, StoreMode};
use crate::error::CliError;

pub fn run_list(
    context: &CliContext,
    collection: CollectionArg,
    sort: SortOrder,
    as_json: bool,
) -> Result<(), CliError> {
    let store = context.open_store(StoreMode::Local)?;
    let mut records = store.list(collection.key());
    sort_records(&mut records, sort);
    print_records(&records, as_json)
}
