//! # chatweave CLI
//!
//! Imports one or more export folders or files, merges everything that
//! belongs to the same chat, and writes the conversation list as JSON.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process;
use std::time::Instant;

use clap::Parser as ClapParser;

use chatweave::cli::Args;
use chatweave::config::ParseConfig;
use chatweave::import::import_path;
use chatweave::merge::merge_conversations;
use chatweave::parser::{ParseSession, ParsedConversation};
use chatweave::ChatweaveError;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), ChatweaveError> {
    let total_start = Instant::now();
    let args = <Args as ClapParser>::parse();

    println!("chatweave v{}", env!("CARGO_PKG_VERSION"));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Inputs:  {}", args.inputs.join(", "));
    println!("Output:  {}", args.output);
    if args.infer_omitted_media {
        println!("Mode:    inferring omitted media");
    }
    println!();

    let config = ParseConfig::new().with_infer_omitted_media(args.infer_omitted_media);
    let session = ParseSession::with_config(config);

    // Step 1: Import every input path
    let parse_start = Instant::now();
    let mut parsed: Vec<ParsedConversation> = Vec::new();
    for (index, input) in args.inputs.iter().enumerate() {
        println!("Importing {}/{}: {}", index + 1, args.inputs.len(), input);
        parsed.extend(import_path(&session, Path::new(input))?);
    }

    if parsed.is_empty() {
        return Err(ChatweaveError::no_exports(args.inputs[0].clone()));
    }

    let source_count = parsed.len();
    let message_count: usize = parsed.iter().map(|c| c.messages.len()).sum();
    println!(
        "   Found {} source(s), {} message(s) ({:.2}s)",
        source_count,
        message_count,
        parse_start.elapsed().as_secs_f64()
    );

    // Step 2: Merge and deduplicate
    println!("Merging conversations...");
    let merge_start = Instant::now();
    let conversations = merge_conversations(parsed);
    let merged_count: usize = conversations.iter().map(|c| c.messages.len()).sum();
    println!(
        "   {} conversation(s), {} message(s) after dedup ({:.2}s)",
        conversations.len(),
        merged_count,
        merge_start.elapsed().as_secs_f64()
    );

    // Step 3: Write JSON
    println!("Writing {}...", args.output);
    let file = File::create(&args.output)?;
    let writer = BufWriter::new(file);
    if args.pretty {
        serde_json::to_writer_pretty(writer, &conversations)?;
    } else {
        serde_json::to_writer(writer, &conversations)?;
    }

    println!();
    println!("Done! Output saved to {}", args.output);
    println!();
    println!("Summary:");
    println!("   Sources:       {}", source_count);
    println!("   Parsed:        {} messages", message_count);
    println!("   Deduplicated:  {} messages", merged_count);
    println!("   Conversations: {}", conversations.len());
    for conversation in &conversations {
        println!(
            "     {} — {} message(s), {} participant(s)",
            conversation.title,
            conversation.messages.len(),
            conversation.participants.len()
        );
    }
    println!();
    println!(
        "Total time: {:.2}s",
        total_start.elapsed().as_secs_f64()
    );

    Ok(())
}
