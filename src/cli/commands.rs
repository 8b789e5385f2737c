//! CLI command implementations
//!
//! Every command opens a [`Session`]: configuration, registry and the
//! data snapshot, wired into an [`Engine`]. The snapshot is written back
//! only after a write actually executed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};

use crate::audit::AuditQuery;
use crate::config::EngineConfig;
use crate::engine::{Engine, EngineError, Reply, Turn};
use crate::observability::Event;
use crate::plan::{OperationPlan, WriteAction};
use crate::schema::{RegistryFile, SchemaLoader, SchemaRegistry};
use crate::store::{InMemoryStore, Snapshot};
use crate::write::{WriteOptions, WriteOutcome};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_request, read_requests, write_error, write_response};

/// Entry point used by the binary
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    crate::observability::init_logging(cli.log_format.into());

    let result = run_command(&cli);
    if let Err(e) = &result {
        write_error(e.code(), &e.to_string())?;
    }
    result
}

/// Run the appropriate command based on CLI args
pub fn run_command(cli: &Cli) -> CliResult<()> {
    let session = Session::open(cli.config.as_deref(), &cli.data)?;

    match &cli.command {
        Command::Read => write_response(session.read(&read_request()?)?),
        Command::Write {
            dry_run,
            force,
            text,
        } => write_response(session.write(&read_request()?, text, *dry_run, *force)?),
        Command::Converse {
            conversation,
            confirm,
        } => converse(&session, conversation, *confirm),
        Command::Audit {
            collection,
            action,
            since,
            until,
        } => {
            let mut query = AuditQuery::new();
            if let Some(collection) = collection {
                query = query.collection(collection.clone());
            }
            if let Some(action) = action {
                query = query.action(parse_action(action)?);
            }
            if let Some(since) = since {
                query = query.since(*since);
            }
            if let Some(until) = until {
                query = query.until(*until);
            }
            write_response(session.audit(&query)?)
        }
        Command::Registry => write_response(session.registry()?),
    }
}

/// Reads turns line by line until stdin closes.
///
/// A failing turn is reported and the loop continues, so the pending
/// operation survives a bad line.
fn converse(session: &Session, conversation: &str, confirm: bool) -> CliResult<()> {
    for request in read_requests() {
        let result = request.and_then(|raw| {
            let mut turn: Turn = serde_json::from_value(raw)?;
            if turn.conversation_id.is_none() {
                turn.conversation_id = Some(conversation.to_string());
            }
            turn.confirm |= confirm;
            session.turn(&turn)
        });
        match result {
            Ok(data) => write_response(data)?,
            Err(e) => write_error(e.code(), &e.to_string())?,
        }
    }
    Ok(())
}

fn parse_action(raw: &str) -> CliResult<WriteAction> {
    serde_json::from_value(Value::String(raw.to_string()))
        .map_err(|_| CliError::input(format!("unknown write action '{}'", raw)))
}

/// Loaded configuration, registry and store for one invocation
pub struct Session {
    store: Arc<InMemoryStore>,
    engine: Engine,
    data: PathBuf,
}

impl Session {
    pub fn open(config_path: Option<&Path>, data: &Path) -> CliResult<Self> {
        let config = match config_path {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::from_env(),
        };
        let registry = match &config.registry_path {
            Some(path) => SchemaLoader::load(path)?,
            None => SchemaRegistry::builtin(),
        };
        tracing::info!(
            event = %Event::SchemasLoaded,
            collections = registry.len(),
            "schema registry ready"
        );

        let store = Arc::new(InMemoryStore::from_registry(&registry));
        Snapshot::load(data)?.restore_into(&store)?;

        let engine = Engine::new(registry, store.clone(), config);
        Ok(Self {
            store,
            engine,
            data: data.to_path_buf(),
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn read(&self, raw: &Value) -> CliResult<Value> {
        let plan = OperationPlan::from_value(raw).map_err(EngineError::from)?;
        Ok(self.engine.read(&plan)?.to_value())
    }

    /// Accepts a `{"mode": "write", ...}` envelope or a bare operation.
    pub fn write(&self, raw: &Value, text: &str, dry_run: bool, force: bool) -> CliResult<Value> {
        let envelope = if raw.get("mode").is_some() {
            raw.clone()
        } else {
            json!({"mode": "write", "operation": raw})
        };
        let op = match OperationPlan::from_value(&envelope).map_err(EngineError::from)? {
            OperationPlan::Write { operation } => operation,
            other => {
                return Err(CliError::input(format!(
                    "expected a write plan, got '{}'",
                    other.kind()
                )))
            }
        };

        let options = WriteOptions {
            dry_run,
            require_confirm: self.engine.config().require_confirm && !force,
        };
        let outcome = self.engine.write(text, &op, options)?;
        if outcome.is_executed() {
            self.save()?;
        }
        Ok(outcome.to_value())
    }

    pub fn turn(&self, turn: &Turn) -> CliResult<Value> {
        let reply = self.engine.handle(turn)?;
        if matches!(reply, Reply::Write(WriteOutcome::Executed(_))) {
            self.save()?;
        }
        Ok(reply.to_value())
    }

    pub fn audit(&self, query: &AuditQuery) -> CliResult<Value> {
        let records = query.run(self.engine.store(), &self.engine.config().audit_collection)?;
        Ok(serde_json::to_value(records)?)
    }

    pub fn registry(&self) -> CliResult<Value> {
        let file = RegistryFile {
            collections: self.engine.registry().iter().cloned().collect(),
        };
        Ok(serde_json::to_value(file)?)
    }

    fn save(&self) -> CliResult<()> {
        Snapshot::capture(&self.store)?.save(&self.data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn session(tmp: &TempDir, allow_writes: bool) -> Session {
        let config = tmp.path().join("opguard.json");
        fs::write(&config, json!({"allow_writes": allow_writes}).to_string()).unwrap();
        Session::open(Some(&config), &tmp.path().join("data.json")).unwrap()
    }

    #[test]
    fn test_write_persists_snapshot() {
        let tmp = TempDir::new().unwrap();
        let s = session(&tmp, true);

        let out = s
            .write(
                &json!({"action": "insertOne", "collection": "projects", "data": {"name": "Plant"}}),
                "alta proyecto",
                false,
                false,
            )
            .unwrap();
        assert_eq!(out["ok"], true);

        let reopened = session(&tmp, true);
        let found = reopened
            .read(&json!({"mode": "find", "collection": "projects"}))
            .unwrap();
        assert_eq!(found.as_array().unwrap().len(), 1);
        assert_eq!(found[0]["name"], "Plant");
    }

    #[test]
    fn test_dry_run_does_not_save() {
        let tmp = TempDir::new().unwrap();
        let s = session(&tmp, true);

        let out = s
            .write(
                &json!({"action": "insertOne", "collection": "projects", "data": {"name": "Plant"}}),
                "",
                true,
                false,
            )
            .unwrap();
        assert_eq!(out["dryRun"], true);
        assert!(!tmp.path().join("data.json").exists());
    }

    #[test]
    fn test_write_rejects_read_plan() {
        let tmp = TempDir::new().unwrap();
        let err = session(&tmp, true)
            .write(&json!({"mode": "find", "collection": "projects"}), "", false, false)
            .unwrap_err();
        assert_eq!(err.code(), "OPG_CLI_INPUT");
    }

    #[test]
    fn test_audit_lists_committed_writes() {
        let tmp = TempDir::new().unwrap();
        let s = session(&tmp, true);
        s.write(
            &json!({"action": "insertOne", "collection": "projects", "data": {"name": "Plant"}}),
            "alta",
            false,
            false,
        )
        .unwrap();

        let records = s
            .audit(&AuditQuery::new().action(parse_action("insertOne").unwrap()))
            .unwrap();
        assert_eq!(records.as_array().unwrap().len(), 1);
        assert_eq!(records[0]["sourceText"], "alta");
    }

    #[test]
    fn test_unknown_action() {
        assert_eq!(parse_action("dropAll").unwrap_err().code(), "OPG_CLI_INPUT");
    }

    #[test]
    fn test_registry_lists_builtin() {
        let tmp = TempDir::new().unwrap();
        let registry = session(&tmp, false).registry().unwrap();
        assert!(registry["collections"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c["name"] == "vendors"));
    }
}
