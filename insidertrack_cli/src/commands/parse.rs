//! Parse a local filing document and print the extraction result as JSON.
//! Useful for inspecting a single filing without hitting EDGAR.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use insidertrack_lib::extractor::extract;

#[derive(Args)]
pub struct ParseArgs {
    /// Path to a filing document (the raw .txt as disseminated by EDGAR)
    pub file: PathBuf,

    /// Print warnings to stderr instead of including them in the JSON
    #[arg(long)]
    pub quiet_warnings: bool,
}

pub fn run(args: &ParseArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let parsed = extract(&text)?;

    if args.quiet_warnings {
        for warning in &parsed.warnings {
            eprintln!("warning: {}", warning);
        }
    }

    let doc = serde_json::json!({
        "transactions": parsed.transactions,
        "footnotes": parsed.footnotes,
        "warnings": if args.quiet_warnings { Vec::new() } else { parsed.warnings.clone() },
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);

    Ok(())
}
