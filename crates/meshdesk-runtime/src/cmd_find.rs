//! `meshdesk find`: bounded wait for a record with a matching field.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use meshdesk_core::types::EntityType;
use meshdesk_projection::{FieldQuery, ProjectionError, SearchOutcome, find_by_field};
use meshdesk_store::MemoryStore;

use crate::cli::FindOpts;
use crate::config::Config;

/// Entry point for `meshdesk find`.
///
/// Returns an exit code:
/// - 0: found (record JSON on stdout)
/// - 1: not found before the deadline
/// - 2: bad arguments or the subscription failed
/// - 3: interrupted (Ctrl-C)
pub async fn cmd_find(store: &MemoryStore, config: &Config, opts: &FindOpts) -> i32 {
    let show = std::io::stderr().is_terminal() && !opts.quiet;
    let entity_type = match opts.entity_type.parse::<EntityType>() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{e}");
            return 2;
        }
    };
    let query = FieldQuery::new(entity_type, &opts.field, &opts.value);
    let timeout = opts
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.search_timeout());

    if show {
        eprintln!(
            "Searching {entity_type}.{} for {:?} (up to {}ms)...",
            query.field,
            query.needle,
            timeout.as_millis()
        );
    }

    let result = tokio::select! {
        result = search(store, config, &query, timeout) => result,
        _ = tokio::signal::ctrl_c() => {
            if show {
                eprintln!();
            }
            return 3;
        }
    };

    if let Ok(SearchOutcome::Found(record)) = &result {
        match serde_json::to_string_pretty(record) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Cannot encode record: {e}");
                return 2;
            }
        }
    }
    if !opts.quiet {
        match &result {
            Ok(SearchOutcome::NotFound) => eprintln!(
                "No {entity_type} with {} = {:?} within {}ms",
                query.field,
                query.needle,
                timeout.as_millis()
            ),
            Err(e) => eprintln!("Search failed: {e}"),
            Ok(SearchOutcome::Found(_)) => {}
        }
    }
    exit_code(&result)
}

pub(crate) async fn search(
    store: &MemoryStore,
    config: &Config,
    query: &FieldQuery,
    timeout: Duration,
) -> Result<SearchOutcome, ProjectionError> {
    find_by_field(
        Arc::new(store.clone()),
        query,
        timeout,
        config.projection_options(),
    )
    .await
}

pub(crate) fn exit_code(result: &Result<SearchOutcome, ProjectionError>) -> i32 {
    match result {
        Ok(SearchOutcome::Found(_)) => 0,
        Ok(SearchOutcome::NotFound) => 1,
        Err(_) => 2,
    }
}
