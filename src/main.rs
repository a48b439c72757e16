//! glance - inspect documents as normalized word streams

use std::process::ExitCode;

use clap::Parser;

use glance::{AdapterRegistry, ParseOptions, Strictness};

#[derive(Parser)]
#[command(name = "glance")]
#[command(version, about = "Parse a document into a normalized word stream", long_about = None)]
#[command(after_help = "EXAMPLES:
    glance book.epub            Show metadata and counts
    glance --words notes.md     Print the word stream
    glance --json report.docx   Emit the full parse as JSON")]
struct Cli {
    /// Input file (epub, mobi, docx, rtf, fb2, html, md, txt)
    #[arg(value_name = "INPUT")]
    input: String,

    /// Print every word in stream order
    #[arg(short, long)]
    words: bool,

    /// Emit the full parse output as JSON
    #[arg(short, long)]
    json: bool,

    /// Fail on recoverable corruption instead of patching over it
    #[arg(long)]
    strict: bool,

    /// Suppress warnings
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let options = ParseOptions {
        strictness: if cli.strict {
            Strictness::Strict
        } else {
            Strictness::Lenient
        },
        ..Default::default()
    };

    let registry = AdapterRegistry::with_defaults();
    let output = registry
        .parse_file(&cli.input, &options)
        .map_err(|e| format!("{} ({})", e, e.category()))?;

    if !cli.quiet {
        for warning in &output.warnings {
            eprintln!("warning: {warning}");
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?;
        println!("{json}");
        return Ok(());
    }

    if cli.words {
        for word in &output.document.words {
            if !word.is_image_placeholder() {
                println!("{}", word.text);
            }
        }
        return Ok(());
    }

    println!("File: {}", cli.input);
    if let Some(ref title) = output.title {
        println!("Title: {title}");
    }
    if let Some(ref author) = output.author {
        println!("Author: {author}");
    }
    println!("Words: {}", output.document.total_words());
    println!("Paragraphs: {}", output.document.total_paragraphs());
    println!("Pages: {}", output.document.total_pages());
    println!("Chapters: {}", output.chapters.len());
    for chapter in &output.chapters {
        println!("  {} (word {})", chapter.title, chapter.start_word);
    }

    Ok(())
}
