//! Command-line interface definition using clap.

use clap::Parser;

/// Merge exported chat folders into a normalized, deduplicated
/// conversation model and write it as JSON.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatweave")]
#[command(version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    chatweave exports/
    chatweave 'WhatsApp Chat with Alice.txt'
    chatweave export-2023/ export-2024/ -o merged.json
    chatweave exports/ --pretty --infer-omitted-media")]
pub struct Args {
    /// Export folders or .txt files to import
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Path to the JSON output file
    #[arg(short, long, default_value = "conversations.json")]
    pub output: String,

    /// Pretty-print the JSON output
    #[arg(short, long)]
    pub pretty: bool,

    /// Best-effort mapping of filename-less "omitted" media onto unused
    /// files (off by default; the guess has no reliable correctness basis)
    #[arg(long)]
    pub infer_omitted_media: bool,
}
