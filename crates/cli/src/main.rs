//! Line-oriented shell for manually driving the [`editor::Editor`] facade —
//! a stand-in for a real TUI (rendering is out of scope for this crate),
//! grounded in `markrepedersen-liveshare`'s `clap`-based `Opts` and the
//! teacher's `tracing_subscriber::registry()` init in `server/src/main.rs`.

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use editor::Editor;

/// Collaborative terminal text editor.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Opts {
    /// Path to the file to open.
    path: PathBuf,

    /// Immediately host a session named after the opened file.
    #[arg(long, conflicts_with = "join")]
    host: bool,

    /// Immediately join a session discovered under this name.
    #[arg(long)]
    join: Option<String>,

    /// Overrides the generated site identifier (useful in tests and
    /// scripted demos).
    #[arg(long)]
    site: Option<String>,

    /// Increases log verbosity; repeatable (-v, -vv).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppresses all logging below `error`.
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn init_tracing(opts: &Opts) {
    let default_filter = if opts.quiet {
        "error"
    } else {
        match opts.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn random_site() -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("site-{suffix:08x}")
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();
    init_tracing(&opts);

    let contents = std::fs::read_to_string(&opts.path)
        .with_context(|| format!("failed to read {}", opts.path.display()))?;

    let site = opts.site.clone().unwrap_or_else(random_site);
    let (editor, mut changes) = Editor::new(site, &contents);

    if opts.host {
        let session_name = editor.host().await?;
        println!("hosting session \"{session_name}\"");
    } else if let Some(name) = &opts.join {
        editor.join(name).await?;
        println!("joined session \"{name}\"");
    }

    // Drain change notifications in the background so the bounded channel
    // never fills while the shell loop is blocked reading a line of stdin.
    tokio::spawn(async move { while changes.recv().await.is_some() {} });

    run_shell(&editor, &opts.path).await
}

/// Reads commands from stdin until `:q`. Not a rendering surface — see the
/// module doc comment — just enough to drive every facade intent by hand.
async fn run_shell(editor: &Editor, path: &PathBuf) -> Result<()> {
    print_help();
    let mut line = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        line.clear();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break; // EOF on stdin
        }
        let command = line.trim_end_matches('\n');

        if let Some(rest) = command.strip_prefix("i") {
            for ch in rest.chars() {
                editor.insert(ch).await;
            }
        } else if command == "d" {
            editor.delete_back().await;
        } else if command == "h" {
            editor.move_left().await;
        } else if command == "l" {
            editor.move_right().await;
        } else if command == "k" {
            editor.move_up().await;
        } else if command == "j" {
            editor.move_down().await;
        } else if command == ":w" {
            std::fs::write(path, editor.text().await)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
        } else if command == ":q" {
            break;
        } else if command == ":host" {
            let session_name = editor.host().await?;
            println!("hosting session \"{session_name}\"");
        } else if let Some(name) = command.strip_prefix(":join ") {
            editor.join(name.trim()).await?;
            println!("joined session \"{name}\"");
        } else if command == ":sessions" {
            editor.start_discovery().await?;
            for session in editor.available_sessions().await {
                println!("{} @ {}", session.name, session.addr);
            }
        } else if command == ":p" {
            println!("{}", editor.text().await);
        } else if command.is_empty() {
            continue;
        } else {
            println!("unrecognized command: {command:?}");
        }
    }
    Ok(())
}

fn print_help() {
    println!("commands: i<text>  d  h l k j  :w  :q  :host  :join <name>  :sessions  :p");
}
