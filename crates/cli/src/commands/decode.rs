//! Decode Command - turn captured console output into styled segments

use anyhow::{Context, Result};
use clap::Args;
use runwatch_common::ansi::{self, Segment};
use serde::Serialize;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::output::{render_line, OutputFormat};

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File with captured output; reads stdin when omitted
    pub file: Option<PathBuf>,

    /// Drop styling instead of re-rendering it
    #[arg(long)]
    pub plain: bool,
}

#[derive(Serialize)]
struct DecodedLine {
    line: usize,
    segments: Vec<Segment>,
}

pub fn execute(args: DecodeArgs, format: OutputFormat) -> Result<()> {
    let mut reader: Box<dyn BufRead> = match &args.file {
        Some(path) => Box::new(BufReader::new(
            std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    let mut decoded = Vec::new();
    let mut buf = Vec::new();
    let mut index = 0;
    while let Some(line) = next_line(&mut reader, &mut buf)? {
        index += 1;
        match format {
            OutputFormat::Json | OutputFormat::Yaml => decoded.push(DecodedLine {
                line: index,
                segments: ansi::decode(&line),
            }),
            OutputFormat::Table | OutputFormat::Plain => {
                println!("{}", render_line(&line, args.plain));
            }
        }
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&decoded)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&decoded)?),
        OutputFormat::Table | OutputFormat::Plain => {}
    }
    Ok(())
}

/// Next line without its terminator. Captured output is raw bytes, so invalid
/// UTF-8 is replaced rather than rejected.
fn next_line(reader: &mut dyn BufRead, buf: &mut Vec<u8>) -> std::io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}
