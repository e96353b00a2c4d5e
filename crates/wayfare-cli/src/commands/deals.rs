use wayfare_core::collections;

use crate::commands::common::{default_top_deals, print_records, CliContext, StoreMode};
use crate::error::CliError;

pub fn run_deals(context: &CliContext, as_json: bool) -> Result<(), CliError> {
    let store = context.open_store(StoreMode::Local)?;
    let deals = store.seed_if_empty(collections::TOP_DEALS, default_top_deals());
    print_records(&deals, as_json)
}
