use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use arbor_backend::{BackendConfig, BackendRegistry, Descriptor};
use arbor_io::{copy_backend, EventCounts, Migrator, TimerListener};
use arbor_schema::resource::CONTENTS;
use arbor_schema::SchemaRegistry;
use arbor_types::{Id, SingleFeatureKey};
use colored::Colorize;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Import(args) => cmd_import(args),
        Command::Export(args) => cmd_export(args),
        Command::Copy(args) => cmd_copy(args),
        Command::Info(args) => cmd_info(args),
    }
}

fn load_schemas(paths: &[PathBuf]) -> anyhow::Result<Arc<SchemaRegistry>> {
    let registry = SchemaRegistry::new();
    for path in paths {
        let schema = registry
            .load(path)
            .with_context(|| format!("loading schema {}", path.display()))?;
        debug!(uri = %schema.uri(), "schema loaded");
    }
    Ok(Arc::new(registry))
}

fn cmd_import(args: ImportArgs) -> anyhow::Result<()> {
    let schemas = load_schemas(&args.schema)?;
    std::fs::create_dir_all(&args.dir)?;
    let backend = BackendRegistry::with_defaults()
        .open(&BackendConfig::file(&args.dir, args.mapping))
        .with_context(|| format!("opening {}", args.dir.display()))?;

    let counts = Arc::new(EventCounts::default());
    let timer = TimerListener::new();
    let elapsed = timer.elapsed();
    let mut migrator = Migrator::from_xmi_path(schemas, &args.input)?
        .with_counter(Arc::clone(&counts))
        .with_listener(timer)
        .to_backend(Arc::clone(&backend), args.workers)?;
    if args.progress {
        migrator = migrator.with_progress();
    }
    migrator
        .migrate()
        .with_context(|| format!("importing {}", args.input.display()))?;
    backend.close()?;

    println!(
        "{} Imported {} into {}",
        "✓".green().bold(),
        args.input.display().to_string().bold(),
        args.dir.display().to_string().bold()
    );
    println!(
        "  {} objects, {} attribute values, {} references",
        counts.elements().to_string().cyan(),
        counts.attributes().to_string().cyan(),
        counts.references().to_string().cyan()
    );
    if let Some(elapsed) = *elapsed.lock() {
        println!("  in {:.2?}", elapsed);
    }
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let schemas = load_schemas(&args.schema)?;
    let backend = BackendRegistry::with_defaults()
        .open_dir(&args.dir)
        .with_context(|| format!("opening {}", args.dir.display()))?;

    let counts = Arc::new(EventCounts::default());
    Migrator::from_backend(schemas, Arc::clone(&backend))
        .with_counter(Arc::clone(&counts))
        .to_xmi_path(&args.output, args.compress)?
        .migrate()
        .with_context(|| format!("exporting {}", args.dir.display()))?;
    backend.close()?;

    let form = if args.compress { " (zstd)" } else { "" };
    println!(
        "{} Exported {} objects to {}{}",
        "✓".green().bold(),
        counts.elements().to_string().cyan(),
        args.output.display().to_string().bold(),
        form
    );
    Ok(())
}

fn cmd_copy(args: CopyArgs) -> anyhow::Result<()> {
    let Some(descriptor) = Descriptor::read(&args.from)? else {
        bail!("{} is not a backend directory", args.from.display());
    };
    if Descriptor::read(&args.to)?.is_some() {
        bail!("{} already holds a backend", args.to.display());
    }
    let registry = BackendRegistry::with_defaults();
    let source = registry.open_dir(&args.from)?;
    let mapping = args.mapping.unwrap_or(descriptor.mapping);
    std::fs::create_dir_all(&args.to)?;
    let target = registry.open(&BackendConfig::file(&args.to, mapping))?;

    copy_backend(source.as_ref(), target.as_ref())?;
    source.close()?;
    target.close()?;

    println!(
        "{} Copied {} ({}) to {} ({})",
        "✓".green().bold(),
        args.from.display().to_string().bold(),
        descriptor.mapping,
        args.to.display().to_string().bold(),
        mapping
    );
    Ok(())
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let Some(descriptor) = Descriptor::read(&args.dir)? else {
        bail!("{} is not a backend directory", args.dir.display());
    };
    let backend = BackendRegistry::with_defaults().open_dir(&args.dir)?;
    let roots = backend
        .all_values_of(&SingleFeatureKey::new(Id::ROOT, CONTENTS))?
        .len();
    let records = backend.records()?.len();
    backend.close()?;

    println!("{}", args.dir.display().to_string().bold());
    println!("  backend:  {}", descriptor.backend.cyan());
    println!("  mapping:  {}", descriptor.mapping.to_string().cyan());
    println!("  format:   {}", descriptor.format);
    println!("  roots:    {}", roots.to_string().yellow());
    println!("  records:  {}", records);
    Ok(())
}
