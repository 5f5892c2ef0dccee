// jdwp-memory - live class instance census for a JVM over JDWP
//
// Attaches to a JVM started with -agentlib:jdwp, prints the class table on
// every pause and reads simple commands from stdin

use anyhow::{bail, Result};
use clap::Parser;
use memory_view::{
    ClassIndex, ClassLookup, ClassesTable, ClassesView, DebugSession, InstancesTracker,
    JdwpDebuggee, MemoryViewConfig, TrackingType, ViewHandle, ViewOptions, ViewServices,
    ViewUpdate,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "jdwp-memory", version, about = "Live class instance census for a JVM over JDWP")]
struct Args {
    /// JDWP host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// JDWP port
    #[arg(short, long, default_value_t = 5005)]
    port: u16,

    /// Tracked classes and filters (JSON); saved back on exit
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Classes per instance-count request (default depends on the VM)
    #[arg(long)]
    batch_size: Option<usize>,
}

#[derive(Debug, PartialEq)]
enum CliCommand {
    Pause,
    Resume,
    Track(String, TrackingType),
    Untrack(String),
    Select(String),
    Filter(String),
    DiffOnly(bool),
    InstancesOnly(bool),
    Quit,
}

fn parse_switch(value: Option<&str>) -> Result<bool> {
    match value {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        _ => bail!("expected on or off"),
    }
}

fn parse_command(line: &str) -> Result<CliCommand> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        bail!("empty command");
    };

    let command = match verb {
        "pause" => CliCommand::Pause,
        "resume" => CliCommand::Resume,
        "track" => {
            let (Some(name), Some(kind)) = (parts.next(), parts.next()) else {
                bail!("usage: track <class> diff|new");
            };
            let tracking = kind.parse::<TrackingType>().map_err(anyhow::Error::msg)?;
            CliCommand::Track(name.to_string(), tracking)
        }
        "untrack" => match parts.next() {
            Some(name) => CliCommand::Untrack(name.to_string()),
            None => bail!("usage: untrack <class>"),
        },
        "select" => match parts.next() {
            Some(name) => CliCommand::Select(name.to_string()),
            None => bail!("usage: select <class>"),
        },
        "filter" => CliCommand::Filter(parts.collect::<Vec<_>>().join(" ")),
        "diff-only" => CliCommand::DiffOnly(parse_switch(parts.next())?),
        "instances-only" => CliCommand::InstancesOnly(parse_switch(parts.next())?),
        "quit" | "exit" => CliCommand::Quit,
        other => bail!("unknown command: {}", other),
    };
    Ok(command)
}

async fn print(stdout: &mut Stdout, text: &str) -> Result<()> {
    stdout.write_all(text.as_bytes()).await?;
    if !text.ends_with('\n') {
        stdout.write_all(b"\n").await?;
    }
    stdout.flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Tracing to stderr only - stdout carries the table
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("memory_view=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => MemoryViewConfig::load(path)?,
        None => MemoryViewConfig::default(),
    };

    let debuggee = JdwpDebuggee::attach(&args.host, args.port).await?;
    let session = DebugSession::new();
    debuggee.spawn_event_pump(Arc::clone(&session));

    let tracker = InstancesTracker::from_config(&config);
    let index = ClassIndex::new();
    let (ui, mut updates) = ViewHandle::channel();
    let view = ClassesView::new(
        ViewServices {
            debuggee: Arc::clone(&debuggee),
            session: Arc::clone(&session),
            tracker: Arc::clone(&tracker),
            ui,
            lookup: Arc::new(index.clone()),
        },
        ViewOptions {
            batch_size: args.batch_size,
            show_with_diff_only: config.show_with_diff_only,
            show_with_instances_only: config.show_with_instances_only,
        },
    )?;
    view.set_need_reload(true);

    let mut table = ClassesTable::new(index.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    info!("Attached to {}:{}, type 'pause' to take a census", args.host, args.port);

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else {
                    break;
                };
                if let ViewUpdate::Instances { class, instances } = &update {
                    let listed: Vec<String> = instances.iter().map(|i| i.to_string()).collect();
                    print(&mut stdout, &format!("{} ({} instances): {}", class.name(), instances.len(), listed.join(" "))).await?;
                }
                table.apply(update);
                while let Ok(update) = updates.try_recv() {
                    table.apply(update);
                }
                if table.take_dirty() && !table.is_busy() {
                    print(&mut stdout, &table.render()).await?;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match parse_command(line) {
                    Ok(CliCommand::Quit) => break,
                    Ok(CliCommand::Pause) => debuggee.suspend(&session).await?,
                    Ok(CliCommand::Resume) => debuggee.resume(&session).await?,
                    Ok(CliCommand::Track(name, tracking)) => tracker.add(&name, tracking),
                    Ok(CliCommand::Untrack(name)) => {
                        if !tracker.remove(&name) {
                            print(&mut stdout, &format!("{} is not tracked", name)).await?;
                        }
                    }
                    Ok(CliCommand::Select(name)) => match index.lookup(&name) {
                        Some(class) => {
                            if !view.select_class(&class) {
                                print(&mut stdout, "Pause the application to list instances").await?;
                            }
                        }
                        None => print(&mut stdout, &format!("Unknown class: {}", name)).await?,
                    },
                    Ok(CliCommand::Filter(pattern)) => {
                        table.set_filter_pattern(&pattern);
                        print(&mut stdout, &table.render()).await?;
                    }
                    Ok(CliCommand::DiffOnly(on)) => {
                        config.show_with_diff_only = on;
                        view.set_filters(config.show_with_diff_only, config.show_with_instances_only);
                    }
                    Ok(CliCommand::InstancesOnly(on)) => {
                        config.show_with_instances_only = on;
                        view.set_filters(config.show_with_diff_only, config.show_with_instances_only);
                    }
                    Err(e) => print(&mut stdout, &format!("Error: {}", e)).await?,
                }
            }
        }
    }

    view.dispose();
    if let Some(path) = &args.config {
        tracker.store_into(&mut config);
        if let Err(e) = config.save(path) {
            warn!("Failed to save config: {}", e);
        }
    }

    info!("Shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track_commands() {
        assert_eq!(
            parse_command("track com.example.Foo new").unwrap(),
            CliCommand::Track("com.example.Foo".to_string(), TrackingType::CreationTracked)
        );
        assert!(parse_command("track com.example.Foo").is_err());
        assert!(parse_command("track com.example.Foo sometimes").is_err());
    }

    #[test]
    fn test_parse_switches_and_filter() {
        assert_eq!(parse_command("diff-only on").unwrap(), CliCommand::DiffOnly(true));
        assert!(parse_command("instances-only maybe").is_err());
        assert_eq!(
            parse_command("filter  java util ").unwrap(),
            CliCommand::Filter("java util".to_string())
        );
        assert_eq!(parse_command("quit").unwrap(), CliCommand::Quit);
        assert!(parse_command("launch").is_err());
    }
}
