//! `lava-jit`: drives the HIR core over a synthetic bytecode program.
//!
//! Reads a JSON-encoded `BytecodeProgram` (§6A), builds a `Graph`, runs
//! dominators and the loop-forest/loop-induction passes, and optionally
//! dumps the resulting graph as GraphViz DOT. This is the HIR core's only
//! concrete entry point; it has no lexer, parser, or register allocator of
//! its own (those stay out of scope per `spec.md` §1).

mod error;

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lava_hir::{BytecodeProgram, Dominators, Graph, GraphBuilder, LoopForest, LoopInduction};

use error::CliError;

/// Build and optimize a lavascript HIR graph from a bytecode program.
#[derive(Parser)]
#[command(name = "lava-jit", about = "lavascript HIR builder and optimizer driver")]
struct Cli {
    /// Path to a JSON-encoded bytecode program.
    input: PathBuf,

    /// Write the built graph as GraphViz DOT to this path.
    #[arg(long)]
    dot: Option<PathBuf>,

    /// Skip the loop-induction-typing pass.
    #[arg(long)]
    no_loop_induction: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let program = load_program(&cli.input)?;
    let graph = build_graph(&program, !cli.no_loop_induction)?;

    if let Some(dot_path) = &cli.dot {
        let dot = lava_hir::print(&graph, lava_hir::PrintOptions::default());
        fs::write(dot_path, dot).map_err(|source| CliError::DotWrite { path: dot_path.clone(), source })?;
        tracing::info!(path = %dot_path.display(), "wrote DOT graph");
    }

    Ok(())
}

fn load_program(path: &PathBuf) -> Result<BytecodeProgram, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Io { path: path.clone(), source })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json { path: path.clone(), source })
}

/// Runs the whole pipeline: build -> dominators -> loop forest -> (optional)
/// loop induction. Dominators aren't consumed by anything downstream of
/// this CLI yet, but computing them here exercises the contract end to end
/// and would back a future `--verify` flag.
fn build_graph(program: &BytecodeProgram, run_loop_induction: bool) -> Result<Graph, CliError> {
    tracing::debug!(ops = program.ops.len(), "building graph from bytecode program");
    let mut graph = GraphBuilder::build(program)?;

    let dominators = Dominators::compute(&graph)?;
    tracing::debug!(start = ?graph.start(), "computed dominators");
    let _ = dominators;

    let forest = LoopForest::build(&graph)?;
    tracing::info!(loops = forest.roots().len(), "built loop forest");

    if run_loop_induction {
        let report = LoopInduction::perform(&mut graph, &forest)?;
        tracing::info!(
            typed_ivs = report.typed_ivs,
            specialized = report.specialized,
            "loop induction complete"
        );
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lava_hir::BytecodeOp;

    #[test]
    fn builds_a_minimal_program_end_to_end() {
        let program = BytecodeProgram {
            ops: vec![
                BytecodeOp::ConstFloat64(1.0),
                BytecodeOp::ConstFloat64(2.0),
                BytecodeOp::Binary(lava_hir::BinaryOp::Arith(lava_hir::ArithOp::Add)),
                BytecodeOp::Return,
            ],
        };
        let graph = build_graph(&program, true).unwrap();
        assert!(graph.start().is_some());
    }

    #[test]
    fn bad_json_reports_json_error() {
        let err = serde_json::from_str::<BytecodeProgram>("not json").unwrap_err();
        let cli_err = CliError::Json { path: PathBuf::from("x.json"), source: err };
        assert_eq!(cli_err.exit_code(), 2);
    }
}
