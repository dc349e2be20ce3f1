//! Demo driver for the Field 15 parser: reads a route description from a
//! positional argument or stdin, parses it, and prints the resulting
//! Extracted Route Sequence plus any diagnostics.
//!
//! This binary has no bearing on parsing semantics — it exists only
//! because a teacher-faithful repository always ships a runnable entry
//! point alongside the library.

use std::io::{self, Read};

use clap::Parser;
use f15route::parse_f15;

#[derive(Debug, Parser)]
#[command(
    name = "f15route",
    version,
    about = "Parse ICAO Flight Plan Field 15 route descriptions"
)]
struct Options {
    /// Field 15 route description; reads from stdin when omitted
    field15: Option<String>,

    /// Activate verbose (trace-level) logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Print the Extracted Route Sequence as JSON instead of plain text
    #[arg(short, long, default_value = "false")]
    json: bool,
}

fn main() {
    let options = Options::parse();

    let filter = if options.verbose { "trace" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let source = match options.field15 {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).expect("failed to read Field 15 from stdin");
            buf
        }
    };

    let ers = parse_f15(source.trim());

    if options.json {
        let json = serde_json::to_string(&ers).expect("JSON error");
        println!("{json}");
    } else {
        for element in ers.elements() {
            println!("{element}");
        }
        for error in ers.errors() {
            println!("ERROR [{}, {}): {}", error.span().start, error.span().end, error.message());
        }
    }

    if ers.number_of_errors() > 0 {
        std::process::exit(1);
    }
}
