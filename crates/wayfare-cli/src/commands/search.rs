use wayfare_core::api::SearchResult;
use wayfare_core::collections;

use crate::commands::common::{join_words, truncate, CliContext, StoreMode};
use crate::error::CliError;

pub async fn run_search(
    context: &CliContext,
    from_parts: &[String],
    tab: &str,
    save: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let from = join_words(from_parts).ok_or(CliError::EmptySearchOrigin)?;
    let client = context.require_api_client()?;
    let results = client.search(&from, tab).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for line in format_result_lines(&results) {
            println!("{line}");
        }
    }

    if let Some(id) = save {
        let result = results
            .iter()
            .find(|result| result.id == id)
            .ok_or_else(|| CliError::RecordNotFound {
                collection: "search results".to_string(),
                id: id.to_string(),
            })?;
        let store = context.open_store(StoreMode::Mirrored)?;
        let record = store.save(collections::SAVED_ITEMS, result.to_candidate());
        store.flush_mirror().await;
        println!("Saved {}", record.id);
    }

    Ok(())
}

pub fn format_result_lines(results: &[SearchResult]) -> Vec<String> {
    results
        .iter()
        .map(|result| {
            format!(
                "{:<8}  {:<32}  {:>8}  {:.1}",
                truncate(&result.id, 8),
                truncate(&result.title, 32),
                result.price,
                result.rating
            )
        })
        .collect()
}
