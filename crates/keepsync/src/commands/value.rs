//! `get`, `set` and `watch` handlers.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

use keepsync_core::{Synchronizer, ValueState};

use crate::cli::{GlobalOpts, OutputFormat, SetArgs, WatchArgs};
use crate::error::CliError;
use crate::output;

type JsonSync = Synchronizer<Value>;

// ── Helpers ─────────────────────────────────────────────────────────

/// Parse a command-line or stdin value.
fn parse_value(raw: &str, as_string: bool) -> Result<Value, CliError> {
    if as_string {
        return Ok(Value::String(raw.to_owned()));
    }
    serde_json::from_str(raw).map_err(|source| CliError::InvalidJson { source })
}

/// Render a loaded state: the value, or `null` when the store was empty.
fn render_state(format: OutputFormat, state: &ValueState<Value>) -> Result<String, CliError> {
    output::render(format, &state.value().map(Arc::as_ref))
}

/// Whether two states came from the same publish.
fn same_publish(a: &ValueState<Value>, b: &ValueState<Value>) -> bool {
    match (a, b) {
        (ValueState::Present(a), ValueState::Present(b)) => Arc::ptr_eq(a, b),
        (ValueState::Absent, ValueState::Absent) => true,
        _ => false,
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn get(sync: &JsonSync, format: OutputFormat, global: &GlobalOpts) -> Result<(), CliError> {
    sync.await_init().await?;
    let rendered = render_state(format, &sync.current_value())?;
    output::print_output(&rendered, global.quiet)
}

pub async fn set(sync: &JsonSync, args: SetArgs) -> Result<(), CliError> {
    let value = parse_value(&args.value, args.string)?;
    sync.set(value).await?;
    sync.flush().await?;
    debug!(name = %sync.config().name, "value stored");
    Ok(())
}

pub async fn watch(
    sync: &JsonSync,
    args: WatchArgs,
    format: OutputFormat,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // A failed load would otherwise leave the stream parked at `Unloaded`.
    sync.await_init().await?;

    let mut stream = sync.observe();
    let mut feeder = args.stdin.then(|| tokio::spawn(feed_stdin(sync.clone())));
    let mut drain_to: Option<ValueState<Value>> = None;
    let mut last = ValueState::Unloaded;
    let mut printed = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                debug!("watch interrupted");
                break;
            }
            joined = join_feeder(&mut feeder) => {
                joined?;
                let target = sync.current_value();
                if same_publish(&last, &target) {
                    break;
                }
                drain_to = Some(target);
                continue;
            }
            next = stream.changed() => next,
        };

        let Some(state) = next else { break };
        if state.is_loaded() {
            output::print_output(&render_state(format, &state)?, global.quiet)?;
            printed += 1;
            if args.count.is_some_and(|limit| printed >= limit) {
                break;
            }
        }
        if drain_to.as_ref().is_some_and(|target| same_publish(&state, target)) {
            break;
        }
        last = state;
    }

    if let Some(handle) = feeder {
        handle.abort();
    }
    Ok(())
}

/// Set every non-empty stdin line as a new value, then wait for the last
/// one to be written.
async fn feed_stdin(sync: JsonSync) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        sync.set(parse_value(line, false)?).await?;
    }
    sync.flush().await?;
    Ok(())
}

/// Wait for the stdin feeder, or forever when there is none.
async fn join_feeder(feeder: &mut Option<JoinHandle<Result<(), CliError>>>) -> Result<(), CliError> {
    let Some(handle) = feeder.as_mut() else {
        return std::future::pending().await;
    };
    let joined = handle.await;
    *feeder = None;
    joined.map_err(|e| CliError::Internal(format!("stdin reader failed: {e}")))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_json_or_raw_strings() {
        assert_eq!(parse_value("[1, 2]", false).unwrap(), json!([1, 2]));
        assert_eq!(parse_value("dark", true).unwrap(), json!("dark"));
        assert!(matches!(
            parse_value("dark", false),
            Err(CliError::InvalidJson { .. })
        ));
    }

    #[test]
    fn absent_renders_as_null() {
        assert_eq!(
            render_state(OutputFormat::JsonCompact, &ValueState::Absent).unwrap(),
            "null"
        );
        let present = ValueState::Present(Arc::new(json!({"a": 1})));
        assert_eq!(
            render_state(OutputFormat::JsonCompact, &present).unwrap(),
            r#"{"a":1}"#
        );
    }

    #[test]
    fn publishes_are_compared_by_identity() {
        let shared = Arc::new(json!(1));
        let a = ValueState::Present(Arc::clone(&shared));
        let b = ValueState::Present(shared);
        let equal_but_distinct = ValueState::Present(Arc::new(json!(1)));
        assert!(same_publish(&a, &b));
        assert!(!same_publish(&a, &equal_but_distinct));
        assert!(!same_publish(&ValueState::Unloaded, &ValueState::Unloaded));
    }
}
