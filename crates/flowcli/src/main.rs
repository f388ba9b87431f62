// crates/flowcli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flowschema::{sanitize, StateEvent, VariableType, INPUT_NODE_TYPE};
use flowstate::{
    restore, snapshot, EditorStore, FileStorage, Intent, IntentOutcome, PersistedState,
    StoreConfig, PASSTHROUGH_NODE_TYPE,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowedit")]
#[command(about = "Workflow editor state tools", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a typed name would be stored
    Sanitize {
        text: String,
    },

    /// Write an example editor snapshot
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow_state.json")]
        output: PathBuf,
    },

    /// Print the contents of a snapshot
    Inspect {
        /// Path to the snapshot file
        #[arg(short, long)]
        state: PathBuf,
    },

    /// Apply a JSON array of intents to a snapshot and save the result
    Replay {
        /// Path to the snapshot file; created if missing
        #[arg(short, long)]
        state: PathBuf,

        /// Path to the intent script
        #[arg(long)]
        script: PathBuf,

        #[arg(long, default_value_t = 250)]
        debounce_ms: u64,

        /// Refuse graph and schema mutations
        #[arg(long)]
        read_only: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Sanitize { text } => sanitize_name(&text),
        Commands::Init { output } => create_example_state(&output)?,
        Commands::Inspect { state } => inspect_state(&state)?,
        Commands::Replay {
            state,
            script,
            debounce_ms,
            read_only,
        } => {
            let config = StoreConfig {
                persist_debounce: Duration::from_millis(debounce_ms),
                read_only,
                ..StoreConfig::default()
            };
            replay(&state, &script, config).await?;
        }
    }

    Ok(())
}

fn sanitize_name(text: &str) {
    let sanitized = sanitize(text);
    if sanitized.degenerate {
        println!("{:?} -> placeholder {:?}", text, sanitized.key);
    } else if sanitized.changed {
        println!("{:?} -> {:?} (changed)", text, sanitized.key);
    } else {
        println!("{:?} is already a valid name", text);
    }
}

fn create_example_state(output: &Path) -> Result<()> {
    let mut store = EditorStore::default();
    let script = [
        Intent::AddNode {
            id: Some("inputs".to_string()),
            node_type: INPUT_NODE_TYPE.to_string(),
            title: Some("Workflow Inputs".to_string()),
            position: None,
            fixed_schema: None,
        },
        Intent::AddNode {
            id: Some("forward".to_string()),
            node_type: PASSTHROUGH_NODE_TYPE.to_string(),
            title: Some("Forward".to_string()),
            position: None,
            fixed_schema: None,
        },
        Intent::AddVariable {
            node_id: "inputs".to_string(),
            raw_key: "first_name".to_string(),
            value_type: VariableType::String,
        },
        Intent::AddVariable {
            node_id: "inputs".to_string(),
            raw_key: "count".to_string(),
            value_type: VariableType::Integer,
        },
        Intent::Connect {
            source: "inputs".to_string(),
            source_key: Some("first_name".to_string()),
            target: "forward".to_string(),
            target_handle: "value".to_string(),
        },
    ];
    for intent in script {
        let name = intent.name();
        if !store.dispatch(intent).is_committed() {
            anyhow::bail!("example intent {} was not applied", name);
        }
    }

    let bytes = snapshot(&store.persisted_state())?;
    std::fs::write(output, bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("Created example state: {}", output.display());
    println!();
    println!("Inspect it with:");
    println!("  flowedit inspect --state {}", output.display());

    Ok(())
}

fn print_state(state: &PersistedState) {
    let graph = &state.graph;
    println!("Nodes: {}", graph.nodes().len());
    for node in graph.nodes() {
        let title = graph.config(&node.id).map(|c| c.title.as_str()).unwrap_or("");
        println!("  • {} ({}) \"{}\"", node.id, node.node_type, title);
        if let Some(schema) = graph.schema(&node.id) {
            let fixed = if schema.is_fixed() { " [fixed]" } else { "" };
            println!("    variables{}:", fixed);
            for (key, value_type) in schema.iter() {
                println!("      {}: {}", key, value_type);
            }
        }
    }

    println!("Edges: {}", graph.edges().len());
    for edge in graph.edges().iter() {
        let key = edge.source_key.as_deref().unwrap_or("*");
        println!(
            "  • {}.{} -> {}.{} ({})",
            edge.source, key, edge.target, edge.target_handle, edge.id
        );
    }

    println!("Node types: {}", state.node_types.list_node_types().join(", "));
}

fn inspect_state(path: &Path) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let restored = restore(&bytes);

    println!("State: {}", path.display());
    print_state(&restored.state);

    if restored.is_clean() {
        println!("No problems found");
    } else {
        println!("Diagnostics:");
        for diagnostic in &restored.diagnostics {
            println!("  ⚠️  {}", diagnostic);
        }
    }

    Ok(())
}

async fn replay(state: &Path, script: &Path, config: StoreConfig) -> Result<()> {
    let script_json = std::fs::read_to_string(script)
        .with_context(|| format!("failed to read {}", script.display()))?;
    let intents: Vec<Intent> = serde_json::from_str(&script_json)
        .with_context(|| format!("{} is not a list of intents", script.display()))?;

    let (mut store, persister) =
        EditorStore::open(config, Arc::new(FileStorage::new(state))).await;
    let mut events = store.subscribe();
    if let Ok(StateEvent::Rehydrated { diagnostics, .. }) = events.try_recv() {
        for diagnostic in diagnostics {
            println!("  ⚠️  {}", diagnostic);
        }
    }
    tracing::info!("Replaying {} intent(s) against {}", intents.len(), state.display());

    for (i, intent) in intents.into_iter().enumerate() {
        let name = intent.name();
        match store.dispatch(intent) {
            IntentOutcome::Committed => println!("{:>3} {} ✅", i, name),
            IntentOutcome::NoOp => println!("{:>3} {} (no change)", i, name),
            IntentOutcome::Rejected { reason } => println!("{:>3} {} ❌ {}", i, name, reason),
        }
        while let Ok(event) = events.try_recv() {
            if let StateEvent::Warning { message, .. } = event {
                println!("      ⚠️  {}", message);
            }
        }
    }

    persister.shutdown().await;

    println!();
    print_state(&store.persisted_state());
    println!("Saved generation {} to {}", store.generation(), state.display());

    Ok(())
}
