//! Records command - Edit the managed collection from the terminal
//!
//! Every mutation commits to the local replica first. Unless `--no-sync` is
//! given and a remote is configured, the command then waits the mutation
//! settle delay and runs one sync pass, the same way the daemon reacts to
//! a mutation event.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, info};

use fleetsync_core::domain::{Entity, MutationEvent};

use crate::app::App;
use crate::commands::sync::{report_outcome, run_pass};
use crate::output::{get_formatter, plural, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct RecordsCommand {
    /// Collection to operate on (defaults to the first configured)
    #[arg(long, global = true)]
    pub collection: Option<String>,

    /// Keep the change local; do not sync afterwards
    #[arg(long, global = true)]
    pub no_sync: bool,

    #[command(subcommand)]
    pub action: RecordsAction,
}

#[derive(Debug, Subcommand)]
pub enum RecordsAction {
    /// List records
    List {
        /// List the deleted records instead
        #[arg(long)]
        deleted: bool,
    },
    /// Insert or replace a record given as a JSON object
    Save {
        /// Record JSON; read from --file when omitted
        json: Option<String>,
        /// Read the record JSON from a file
        #[arg(long, conflicts_with = "json")]
        file: Option<PathBuf>,
    },
    /// Move a record to the deleted records
    Delete { id: String },
    /// Move a deleted record back into the collection
    Restore { id: String },
    /// Remove a deleted record for good
    Purge { id: String },
    /// Flip a record between active and passive
    ToggleStatus { id: String },
}

impl RecordsCommand {
    pub async fn execute(&self, config: Option<&Path>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let app = App::open(config).await?;
        let mutations = app.mutations(self.collection.as_deref())?;

        let mut events = mutations.subscribe();
        let entity = match &self.action {
            RecordsAction::List { deleted } => {
                let records = if *deleted {
                    mutations.list_deleted().await?
                } else {
                    mutations.list().await?
                };
                print_records(&records, format, &*formatter);
                return Ok(());
            }
            RecordsAction::Save { json, file } => {
                let entity = parse_record(json.as_deref(), file.as_deref())?;
                mutations.save(entity).await?
            }
            RecordsAction::Delete { id } => mutations.soft_delete(id).await?,
            RecordsAction::Restore { id } => mutations.restore(id).await?,
            RecordsAction::Purge { id } => mutations.permanent_delete(id).await?,
            RecordsAction::ToggleStatus { id } => mutations.toggle_status(id).await?,
        };
        let event = next_event(&mut events);

        if format.is_json() {
            formatter.print_json(&json!({
                "mutation": event.as_ref().map(|e| e.kind.to_string()),
                "record": entity,
            }));
        } else {
            let kind = event.as_ref().map(|e| e.kind.to_string()).unwrap_or_default();
            match entity.backend_id() {
                Some(id) => formatter.success(&format!("{} {}", kind, id)),
                None => formatter.success(&format!(
                    "{} (id assigned at next sync)",
                    kind
                )),
            }
        }

        self.sync_after_mutation(&app, event, format, &*formatter).await
    }

    async fn sync_after_mutation(
        &self,
        app: &App,
        event: Option<MutationEvent>,
        format: OutputFormat,
        formatter: &dyn OutputFormatter,
    ) -> Result<()> {
        if self.no_sync || event.is_none() {
            return Ok(());
        }
        if !app.has_remote() {
            formatter.info("Remote not configured; change kept locally");
            return Ok(());
        }

        tokio::time::sleep(Duration::from_millis(app.config.sync.mutation_settle_ms)).await;
        info!(kind = ?event.map(|e| e.kind), "Syncing after mutation");
        let outcome = run_pass(app, format).await?;
        report_outcome(&outcome, format, formatter);
        Ok(())
    }
}

/// Takes the event published by the mutation that just committed
fn next_event(events: &mut broadcast::Receiver<MutationEvent>) -> Option<MutationEvent> {
    match events.try_recv() {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, "No mutation event received");
            None
        }
    }
}

fn parse_record(json: Option<&str>, file: Option<&Path>) -> Result<Entity> {
    let raw = match (json, file) {
        (Some(json), _) => json.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => anyhow::bail!("Provide the record JSON or --file"),
    };
    let value: Value = serde_json::from_str(&raw).context("Record is not valid JSON")?;
    Ok(Entity::from_value(value)?)
}

fn print_records(records: &[Entity], format: OutputFormat, formatter: &dyn OutputFormatter) {
    if format.is_json() {
        formatter.print_json(&json!(records));
        return;
    }

    if records.is_empty() {
        formatter.info("No records");
        return;
    }
    println!("{:<40} {:<10} {}", "ID", "STATUS", "UPDATED");
    for record in records {
        println!(
            "{:<40} {:<10} {}",
            record.backend_id().unwrap_or("-"),
            record.get("status").and_then(Value::as_str).unwrap_or("active"),
            record.updated_at_raw().unwrap_or("-")
        );
    }
    formatter.info(&plural(records.len(), "record"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        records: RecordsCommand,
    }

    fn parse(args: &[&str]) -> RecordsCommand {
        let mut full = vec!["records"];
        full.extend_from_slice(args);
        Harness::parse_from(full).records
    }

    async fn run(config: &Path, args: &[&str]) -> Result<()> {
        parse(args).execute(Some(config), OutputFormat::Json).await
    }

    #[test]
    fn test_parse_flags_after_action() {
        let cmd = parse(&["delete", "uuid-1", "--no-sync", "--collection", "vehicle_records"]);
        assert!(cmd.no_sync);
        assert_eq!(cmd.collection.as_deref(), Some("vehicle_records"));
        assert!(matches!(cmd.action, RecordsAction::Delete { ref id } if id == "uuid-1"));
    }

    #[test]
    fn test_parse_record_rejects_non_objects() {
        assert!(parse_record(Some("[1, 2]"), None).is_err());
        assert!(parse_record(Some("{not json"), None).is_err());
        assert!(parse_record(None, None).is_err());
        let entity = parse_record(Some(r#"{"plate": "AB-123"}"#), None).unwrap();
        assert_eq!(entity.get("plate"), Some(&json!("AB-123")));
    }

    #[tokio::test]
    async fn test_delete_restore_and_toggle_locally() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::app::tests::write_config(dir.path(), "");

        run(&config, &["save", r#"{"__backendId": "uuid-1", "plate": "AB-123"}"#, "--no-sync"])
            .await
            .unwrap();
        run(&config, &["toggle-status", "uuid-1", "--no-sync"]).await.unwrap();

        let app = App::open(Some(config.as_path())).await.unwrap();
        let records = app.mutations(None).unwrap().list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("status"), Some(&json!("passive")));

        run(&config, &["delete", "uuid-1", "--no-sync"]).await.unwrap();
        let mutations = app.mutations(None).unwrap();
        assert!(mutations.list().await.unwrap().is_empty());
        assert_eq!(mutations.list_deleted().await.unwrap().len(), 1);

        run(&config, &["restore", "uuid-1", "--no-sync"]).await.unwrap();
        assert_eq!(mutations.list().await.unwrap().len(), 1);
        assert!(mutations.list_deleted().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::app::tests::write_config(dir.path(), "");

        let err = run(&config, &["purge", "missing", "--no-sync"]).await.err().unwrap();
        assert!(err.to_string().contains("missing"));
    }
}
