//! CLI `load` command: bulk-load knowledge files into the graph.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use cake::bootstrap;
use cake::config::CakeConfig;
use cake::knowledge::sources::KnowledgeSource;

/// Load each file (Markdown by extension, JSON triplets otherwise), optionally
/// the built-in framework sample, then save the snapshot.
pub fn load(config: &CakeConfig, files: &[PathBuf], framework: bool) -> Result<()> {
    let engine = bootstrap::build_engine(config)?;

    let mut sources: Vec<KnowledgeSource> =
        files.iter().cloned().map(KnowledgeSource::from_path).collect();
    if framework {
        sources.insert(0, KnowledgeSource::Framework);
    }
    if sources.is_empty() {
        println!("Nothing to load.");
        return Ok(());
    }

    let pb = ProgressBar::new(sources.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} {msg}")
            .expect("valid template")
            .progress_chars("##-"),
    );

    let mut applied = 0usize;
    let mut skipped = 0usize;
    for source in &sources {
        pb.set_message(source.name());
        let report = bootstrap::load_source(&engine, source)
            .with_context(|| format!("failed to load {}", source.name()))?;
        applied += report.applied;
        skipped += report.skipped;
        pb.inc(1);
    }
    pb.finish_and_clear();

    bootstrap::save_snapshot(&engine, config)?;

    println!("Load complete:");
    println!("  Sources:           {}", sources.len());
    println!("  Triplets applied:  {applied}");
    if skipped > 0 {
        println!("  Triplets skipped:  {skipped} (malformed)");
    }
    println!("  Graph nodes:       {}", engine.graph().node_count());
    println!("  Graph edges:       {}", engine.graph().edge_count());
    println!("  Snapshot:          {}", config.resolved_snapshot_path().display());

    Ok(())
}
