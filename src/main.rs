// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    version = "0.1.0",
    about = "Extract the IPTV channel list embedded in a JavaScript bundle and emit a TypeScript data module",
    long_about = "Extract the JSON channel list embedded in a rivestream JavaScript bundle, repair the JavaScript-only escape forms into valid JSON, and regenerate the typed TypeScript channel module consumed by the frontend."
)]
struct Args {
    /// Source JavaScript bundle containing the embedded channel list
    #[arg(long, default_value = "rivestream_data.js", help = "Path to the JavaScript bundle containing the w=JSON.parse('...') assignment")]
    input: PathBuf,

    /// Destination TypeScript module (overwritten on success)
    #[arg(long, default_value = "lib/iptv.ts", help = "Path of the generated TypeScript channel module")]
    output: PathBuf,

    /// Debug dump location used when the payload fails to parse
    #[arg(long, default_value = "debug_json.txt", help = "Path the repaired payload is dumped to when JSON decoding fails")]
    debug_dump: PathBuf,
}

/// One emitted channel entry of the generated module.
#[derive(Debug, Clone, Serialize)]
struct Channel {
    id: String,
    name: String,
    logo: String,
    category: String,
    stream_url: String,
    language: String,
    country: String,
}

// Rewrite rules that turn the extracted JavaScript string payload into valid
// JSON, applied in order. Order is significant: a later rule must never
// re-match text introduced by an earlier one.
const REPAIR_RULES: &[(&str, &str)] = &[
    // The payload sat inside a single-quoted JS literal, so every single
    // quote in the data arrives escaped. JSON has no \' escape.
    (r"\\'", "'"),
    // JS permits \xHH byte escapes in string literals; JSON only knows the
    // four-digit \uXXXX form.
    (r"\\x([0-9a-fA-F]{2})", r"\u00$1"),
];

const LOGO_PLACEHOLDER_BASE: &str = "https://via.placeholder.com/150?text=";

struct ChannelExtractor {
    input_path: PathBuf,
    output_path: PathBuf,
    debug_path: PathBuf,
}

impl ChannelExtractor {
    fn new(input_path: PathBuf, output_path: PathBuf, debug_path: PathBuf) -> Self {
        Self {
            input_path,
            output_path,
            debug_path,
        }
    }

    /// Runs the whole transform. The two data-level failure modes (marker
    /// not found, payload not valid JSON) print a diagnostic and return
    /// early without touching the destination file; only environmental
    /// faults (unreadable input, unwritable output) surface as errors.
    fn extract_and_convert(&self) -> Result<()> {
        let source = fs::read_to_string(&self.input_path)
            .with_context(|| format!("Failed to read {}", self.input_path.display()))?;
        log::debug!("read {} bytes from {}", source.len(), self.input_path.display());

        let payload = match extract_payload(&source) {
            Some(payload) => payload,
            None => {
                eprintln!(
                    "Could not find public channels (w variable) in {}",
                    self.input_path.display()
                );
                return Ok(());
            }
        };

        let repaired = repair_payload(payload);
        log::debug!(
            "repaired payload: {} bytes in, {} bytes out",
            payload.len(),
            repaired.len()
        );

        let records = match serde_json::from_str::<Vec<Map<String, Value>>>(&repaired) {
            Ok(records) => records,
            Err(err) => {
                eprintln!("JSON decode error: {}", err);
                fs::write(&self.debug_path, &repaired)
                    .with_context(|| format!("Failed to write {}", self.debug_path.display()))?;
                eprintln!(
                    "Repaired payload saved to {} for inspection",
                    self.debug_path.display()
                );
                return Ok(());
            }
        };

        println!("Found {} public channels", records.len());

        let pb = ProgressBar::new(records.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        pb.set_message("Mapping channels...");

        let mut channels = Vec::new();
        for record in &records {
            if let Some(channel) = map_channel(record) {
                channels.push(channel);
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        log::info!("mapped {} of {} records", channels.len(), records.len());

        let ts_module = format_as_typescript(&channels);
        fs::write(&self.output_path, ts_module)
            .with_context(|| format!("Failed to write {}", self.output_path.display()))?;
        println!("Successfully wrote {}", self.output_path.display());

        Ok(())
    }
}

/// Finds the embedded channel payload: the first `w=JSON.parse('...')`
/// assignment in the bundle. Returns the text between the quotes.
fn extract_payload(source: &str) -> Option<&str> {
    // Non-greedy up to the first ' followed by ). The bundler escapes every
    // single quote inside the data as \', so the first bare quote before a
    // closing paren is the string terminator. A stray unescaped apostrophe
    // sitting directly before a ) would end the match early.
    let re = Regex::new(r"w=JSON\.parse\('(.+?)'\)").ok()?;
    let caps = re.captures(source)?;
    Some(caps.get(1)?.as_str())
}

/// Applies the repair rules in order, yielding text a JSON parser accepts.
/// Running it on already-repaired text is a no-op.
fn repair_payload(raw: &str) -> String {
    let mut repaired = raw.to_string();
    for (pattern, replacement) in REPAIR_RULES {
        let re = Regex::new(pattern).unwrap();
        repaired = re.replace_all(&repaired, *replacement).into_owned();
    }
    repaired
}

/// Derives one output channel from a decoded record. Every field falls back
/// to a defined default; the record is dropped only when, with all fields
/// computed, it has no stream URL.
fn map_channel(record: &Map<String, Value>) -> Option<Channel> {
    let id = str_field(record, "id");
    // The name ends up inside a double-quoted TS literal.
    let name = str_field(record, "name").replace('"', "\\\"");
    let logo = match str_field(record, "logo") {
        logo if logo.is_empty() => {
            format!("{}{}", LOGO_PLACEHOLDER_BASE, name.replace(' ', "+"))
        }
        logo => logo,
    };
    let stream_url = str_field(record, "streamUrl");
    let country = str_field(record, "country");
    let language = get_language(&country).to_string();
    let category = capitalize_first(
        &first_category(record).unwrap_or_else(|| "General".to_string()),
    );

    if stream_url.is_empty() {
        return None;
    }

    Some(Channel {
        id,
        name,
        logo,
        category,
        stream_url,
        language,
        country,
    })
}

/// Serializes the channels as a TypeScript module: the Channel type, the
/// full channel array in input order, and the FEATURED_CHANNELS alias the
/// frontend imports.
fn format_as_typescript(channels: &[Channel]) -> String {
    let mut ts_lines = vec![
        "export type Channel = {".to_string(),
        "  id: string".to_string(),
        "  name: string".to_string(),
        "  logo: string".to_string(),
        "  category: string".to_string(),
        "  streamUrl: string".to_string(),
        "  language?: string".to_string(),
        "  country?: string".to_string(),
        "}".to_string(),
        String::new(),
        "export const channels: Channel[] = [".to_string(),
    ];

    for channel in channels {
        ts_lines.push("  {".to_string());
        ts_lines.push(format!("    id: \"{}\",", channel.id));
        ts_lines.push(format!("    name: \"{}\",", channel.name));
        ts_lines.push(format!("    logo: \"{}\",", channel.logo));
        ts_lines.push(format!("    category: \"{}\",", channel.category));
        ts_lines.push(format!("    streamUrl: \"{}\",", channel.stream_url));
        ts_lines.push(format!("    language: \"{}\",", channel.language));
        ts_lines.push(format!("    country: \"{}\",", channel.country));
        ts_lines.push("  },".to_string());
    }

    ts_lines.push("]".to_string());
    ts_lines.push(String::new());
    ts_lines.push("export const FEATURED_CHANNELS = channels;".to_string());

    let mut module = ts_lines.join("\n");
    module.push('\n');
    module
}

/// String field accessor with the empty string as the defined default, so
/// sparse or malformed records degrade into blank fields instead of failing.
fn str_field(record: &Map<String, Value>, key: &str) -> String {
    record
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// First entry of the record's `categories` array, if there is one.
fn first_category(record: &Map<String, Value>) -> Option<String> {
    record
        .get("categories")
        .and_then(Value::as_array)
        .and_then(|cats| cats.first())
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Uppercases the first character, leaving the rest untouched so internal
/// capitalization like "TV" survives.
fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Maps a channel's country code onto one of the four interface languages.
/// Anything outside the buckets, including a missing country, reads as
/// English.
fn get_language(country: &str) -> &'static str {
    match country.to_uppercase().as_str() {
        "US" | "GB" | "UK" | "CA" | "AU" | "NZ" | "IE" => "en",
        "FR" | "BE" | "CH" | "SN" | "CM" | "CI" => "fr",
        "SA" | "AE" | "EG" | "LB" | "JO" | "KW" | "QA" | "OM" | "BH" | "IQ" | "SY" | "YE"
        | "PS" | "SD" | "LY" | "MA" | "DZ" | "TN" => "ar",
        "KR" => "ko",
        _ => "en",
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let extractor = ChannelExtractor::new(args.input, args.output, args.debug_dump);
    extractor.extract_and_convert()
}
