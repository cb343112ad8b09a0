//! Etlgraph CLI - Declarative ETL Pipelines
//!
//! Validate and run pipeline definitions, browse the operator catalog and
//! profile data files.

use anyhow::{bail, Context, Result};
use etlgraph::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("etlgraph");

    if args.len() < 2 {
        print_usage(program);
        return;
    }

    let result = match args[1].as_str() {
        "validate" => validate_pipeline(&args[2..]),
        "run" => run_pipeline(&args[2..]),
        "list" => {
            list_operators();
            Ok(())
        }
        "info" => operator_info(&args[2..]),
        "profile" => profile_file(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage(program);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(program);
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("Etlgraph v{}", etlgraph::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  validate <pipeline.json>      Check a pipeline definition");
    println!("  run <pipeline.json> [options] Validate and execute a pipeline");
    println!("  list                          List all available operators");
    println!("  info <kind>                   Show detailed info about an operator");
    println!("  profile <file>                Show column statistics for a CSV or JSON file");
    println!("  help                          Show this help message");
    println!();
    println!("Run options:");
    println!("  --config <settings.toml>  Engine settings (directories, extensions)");
    println!("  --records <file.jsonl>    Append execution records as JSON Lines");
    println!("  --run-id <id>             Run identifier (default: random UUID)");
    println!();
    println!("Environment:");
    println!("  ETLGRAPH_UPLOAD_DIR, ETLGRAPH_OUTPUT_DIR, ETLGRAPH_ALLOWED_EXTENSIONS, RUST_LOG");
}

fn read_definition(path: &str) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read pipeline definition '{}'", path))
}

fn validate_pipeline(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        bail!("Please specify a pipeline definition");
    };
    let report = etlgraph::validate(&read_definition(path)?);
    if report.is_valid {
        println!("✅ Pipeline is valid");
        return Ok(());
    }
    eprintln!("Validation failed with {} error(s):", report.errors.len());
    for error in &report.errors {
        eprintln!("   • {}", error);
    }
    std::process::exit(1);
}

struct RunOptions {
    definition: String,
    config: Option<PathBuf>,
    records: Option<PathBuf>,
    run_id: Option<String>,
}

fn parse_run_options(args: &[String]) -> Result<RunOptions> {
    let mut definition = None;
    let mut config = None;
    let mut records = None;
    let mut run_id = None;

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--config", Some(v)) => config = Some(PathBuf::from(v)),
            ("--records", Some(v)) => records = Some(PathBuf::from(v)),
            ("--run-id", Some(v)) => run_id = Some(v.clone()),
            (flag, None) if flag.starts_with("--") => bail!("Option {} needs a value", flag),
            (flag, _) if flag.starts_with("--") => bail!("Unknown option: {}", flag),
            (path, _) => {
                definition = Some(path.to_string());
                i += 1;
                continue;
            }
        }
        i += 2;
    }

    let Some(definition) = definition else {
        bail!("Please specify a pipeline definition");
    };
    Ok(RunOptions {
        definition,
        config,
        records,
        run_id,
    })
}

fn run_pipeline(args: &[String]) -> Result<()> {
    let options = parse_run_options(args)?;
    let settings = EngineSettings::load(options.config.as_deref())?;
    let graph = PipelineGraph::from_json(&read_definition(&options.definition)?)
        .context("invalid pipeline definition")?;

    println!("🔍 Validating pipeline...");
    let registry = Arc::new(OperatorRegistry::with_builtins());
    let report = ValidationPipeline::default_pipeline(registry.clone()).validate(&graph);
    if !report.is_valid {
        eprintln!("Validation failed:");
        for error in &report.errors {
            eprintln!("   • {}", error);
        }
        std::process::exit(1);
    }

    let log_sink: Arc<dyn LogSink> = match &options.records {
        Some(path) => Arc::new(
            JsonLinesSink::create(path)
                .with_context(|| format!("cannot open records file '{}'", path.display()))?,
        ),
        None => Arc::new(LogFacadeSink),
    };
    let run_id = options
        .run_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let output_name = settings.default_output_name(&run_id);
    let run = RunContext::new(run_id, log_sink).with_default_output_name(output_name);

    println!("⚙️  Running {} nodes (run {})", graph.node_count(), run.run_id);
    let executor = PipelineExecutor::new(registry, Arc::new(LocalIo::new(settings.io)));
    match executor.execute(&graph, &run) {
        Ok(outcome) => {
            println!(
                "✅ Complete in {}ms ({} nodes, {} rows written)",
                outcome.stats.duration.as_millis(),
                outcome.stats.nodes_executed,
                outcome.stats.rows_written
            );
            for location in &outcome.locations {
                println!("   → {}", location);
            }
            Ok(())
        }
        Err(e) => {
            if let EngineError::Execution(error) = &e {
                if let Some(fix) = error.suggested_fix() {
                    eprintln!("💡 {}", fix);
                }
            }
            let kind = e.kind();
            Err(anyhow::Error::new(e).context(format!("run failed ({})", kind)))
        }
    }
}

fn list_operators() {
    let registry = OperatorRegistry::with_builtins();
    let grouped = registry.grouped_by_category();

    println!("Available operators ({} total):", registry.len());
    println!();

    for (category, operators) in grouped {
        println!("  📁 {}", category.display_name());
        for metadata in operators {
            println!("      • {} - {}", metadata.kind, metadata.description);
        }
        println!();
    }
}

fn operator_info(args: &[String]) -> Result<()> {
    let Some(kind) = args.first() else {
        bail!("Please specify an operator kind");
    };
    let registry = OperatorRegistry::with_builtins();
    let Some(metadata) = registry.get_metadata(kind) else {
        bail!("Unknown operator kind '{}'", kind);
    };

    println!("Operator: {}", metadata.name);
    println!("Kind: {}", metadata.kind);
    println!("Category: {} (node type {})", metadata.category.display_name(), metadata.category.wire_role());
    let aliases = registry.aliases_of(&metadata.kind);
    if !aliases.is_empty() {
        println!("Aliases: {}", aliases.join(", "));
    }
    if metadata.multi_input {
        println!("Inputs: two (left and right)");
    }
    println!();
    println!("Description:");
    println!("  {}", metadata.description);

    let required = metadata.required_keys();
    if !required.is_empty() {
        println!();
        println!("Required configuration:");
        for key in required {
            println!("  • {}", key);
        }
    }
    if !metadata.tags.is_empty() {
        println!();
        println!("Tags: {}", metadata.tags.join(", "));
    }
    Ok(())
}

fn profile_file(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        bail!("Please specify a file to profile");
    };
    let format = match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => DataFormat::Csv,
        Some(ext) if ext.eq_ignore_ascii_case("json") || ext.eq_ignore_ascii_case("jsonl") => DataFormat::Json,
        _ => bail!("Cannot profile '{}': expected a .csv or .json file", path),
    };
    let mut options = NodeConfig::new();
    if path.ends_with(".jsonl") {
        options.insert("lines", true);
    }

    let io = LocalIo::new(IoSettings {
        confine_sources: false,
        ..IoSettings::default()
    });
    let data = io.load(path, format, &options)?;
    let profile = data.profile(5);

    println!("{}: {} rows × {} columns", path, profile.total_rows, profile.total_columns);
    println!();
    for (name, column) in &profile.column_stats {
        println!(
            "  {} [{:?}] nulls {} ({:.1}%), unique {}",
            name, column.dtype, column.null_count, column.null_percent, column.unique_count
        );
        if let (Some(min), Some(max)) = (column.min, column.max) {
            print!("      min {} max {}", min, max);
            if let Some(mean) = column.mean {
                print!(" mean {:.3}", mean);
            }
            if let Some(median) = column.median {
                print!(" median {}", median);
            }
            println!();
        }
    }
    Ok(())
}
