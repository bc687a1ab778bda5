//! Tunedeck CLI — manage and play a registry of live streams

use std::fs;
use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use log::info;

use tunedeck::presets::PresetLibrary;
use tunedeck::registry::{RegistryEvent, StreamRegistry};
use tunedeck::resolver::StreamResolver;
use tunedeck::session::LiveSession;
use tunedeck::sink::{HttpSinkFactory, SinkFactory};
use tunedeck::storage::JsonFileStorage;

#[derive(Parser)]
#[command(name = "tunedeck", about = "Live stream registry and player", version)]
struct Cli {
    /// Treat the session as a secure origin, enabling proxy fallback for
    /// plain-http streams
    #[arg(long, global = true)]
    secure: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve every stream and list them
    List,
    /// Add a stream by playlist or direct URL
    Add {
        url: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        genre: Option<String>,
    },
    /// Remove the stream at an index
    Remove { index: usize },
    /// Move a stream from one index to another
    Move { from: usize, to: usize },
    /// Export all streams as a collection file
    Export {
        file: String,
        #[arg(long, default_value = "My Streams")]
        name: String,
    },
    /// Import a collection file
    Import { file: String },
    /// List remote presets, or install one by name
    Presets {
        #[arg(long)]
        base_url: String,
        #[arg(long)]
        install: Option<String>,
    },
    /// Resolve and play the stream at an index
    Play { index: usize },
    /// Restore the previous live session
    Restore,
    /// Remove every stream
    Clear,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let storage = JsonFileStorage::open_default()?;
    let mut registry = StreamRegistry::open(storage.clone());
    let resolver = StreamResolver::over_http(cli.secure)?;
    registry.seed_builtins(&resolver)?;

    match cli.command {
        Command::List => {
            let events = registry.subscribe();
            let printer = std::thread::spawn(move || {
                for event in events {
                    if let RegistryEvent::StreamResolved { index, stream } = event {
                        let status = if stream.available {
                            stream.resolved_url.clone().unwrap_or_default()
                        } else {
                            stream.reason.clone().unwrap_or_default()
                        };
                        let genre = stream.genre.as_deref().unwrap_or("-");
                        println!("{index:>3}  {:<40} {:<20} {status}", stream.name, genre);
                    }
                }
            });
            registry.initialize_all(&resolver)?;
            drop(registry);
            printer.join().expect("printer thread panicked");
        }
        Command::Add { url, name, genre } => {
            if registry.add(name, &url, genre, &resolver)? {
                println!("Added {url}");
            } else {
                println!("Already present: {url}");
            }
        }
        Command::Remove { index } => {
            let removed = registry.remove(index)?;
            println!(
                "Removed {}",
                removed.name.unwrap_or(removed.playlist_url)
            );
        }
        Command::Move { from, to } => {
            registry.reorder(from, to)?;
            println!("Moved {from} -> {to}");
        }
        Command::Export { file, name } => {
            let collection = registry.export(&name);
            fs::write(&file, serde_json::to_string_pretty(&collection)?)?;
            println!("Exported {} streams to {file}", collection.streams.len());
        }
        Command::Import { file } => {
            let text = fs::read_to_string(&file)?;
            let report = registry.import_collection_json(&text, &resolver)?;
            println!("Imported {} streams ({} skipped)", report.added, report.skipped);
        }
        Command::Presets { base_url, install } => {
            let library = PresetLibrary::new(&base_url)?;
            let presets = library.available();
            match install {
                Some(wanted) => {
                    let preset = presets
                        .iter()
                        .find(|p| p.name == wanted)
                        .ok_or_else(|| format!("No preset named '{wanted}'"))?;
                    let report = library.install(preset, &mut registry, &resolver)?;
                    println!(
                        "Installed '{}': {} added, {} skipped",
                        preset.name, report.added, report.skipped
                    );
                }
                None => {
                    for preset in &presets {
                        println!("{:<30} {} streams", preset.name, preset.streams.len());
                    }
                    if presets.is_empty() {
                        println!("No presets available");
                    }
                }
            }
        }
        Command::Play { index } => {
            if index >= registry.len() {
                return Err(format!("No stream at index {index}").into());
            }
            registry.resolve_slot(index, &resolver)?;
            let stream = registry.slots()[index]
                .resolved
                .clone()
                .ok_or("Stream did not resolve")?;

            let sink = HttpSinkFactory::new()?.create();
            let mut session = LiveSession::new(storage, sink);
            if !session.play_stream(&stream)? {
                return Err(stream
                    .reason
                    .unwrap_or_else(|| "Stream unavailable".to_string())
                    .into());
            }
            println!("Playing: {}", session.live_display_text().unwrap_or(&stream.name));
            wait_for_enter()?;
            session.stop_live()?;
        }
        Command::Restore => {
            let sink = HttpSinkFactory::new()?.create();
            let mut session = LiveSession::new(storage, sink);
            if session.restore()? {
                let text = session.live_display_text().unwrap_or("live stream").to_string();
                if session.is_paused() {
                    println!("Restored (paused): {text}");
                } else {
                    println!("Restored: {text}");
                    wait_for_enter()?;
                    session.stop_live()?;
                }
            } else {
                println!("No previous session to restore");
            }
        }
        Command::Clear => {
            let count = registry.len();
            registry.clear_all()?;
            info!("cleared {count} streams");
            println!("Removed {count} streams");
        }
    }
    Ok(())
}

fn wait_for_enter() -> io::Result<()> {
    print!("Press Enter to stop... ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(())
}
