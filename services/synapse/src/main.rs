mod app;
mod config;
mod live;
mod voice;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::time::ChronoLocal;

use crate::app::App;
use crate::config::Config;
use crate::voice::{InputSource, VoiceInput};

const BANNER: &str = r#"
============================================================
  SYNAPSE - Voice Commander for Test Automation
============================================================
"#;

#[derive(Parser)]
#[command(name = "synapse", about = "Voice commander for test automation", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the interactive command loop
    Interactive {
        /// Use typed input instead of the microphone
        #[arg(long)]
        no_voice: bool,
        /// Speech recognition language, e.g. en-US
        #[arg(long)]
        language: Option<String>,
    },
    /// Execute a single command line
    Command { text: String },
    /// Generate test scenarios for a target
    Scenarios { target: String },
    /// Generate Playwright tests
    Playwright {
        target: String,
        /// Scenarios file to generate from
        #[arg(long, short)]
        scenarios: Option<String>,
    },
    /// Review code in a file
    Review { file: String },
    /// List generated output files
    Outputs,
    /// Add test IDs to a project via the Marker service
    Marker {
        project_path: String,
        /// Preview changes without applying them
        #[arg(long, short)]
        dry_run: bool,
    },
    /// Rollback Marker changes
    MarkerRollback { project_path: String },
    /// Analyze a project for test IDs
    MarkerAnalyze { project_path: String },
    /// Real-time voice session
    Live,
    /// Continuously print recognized speech (microphone test)
    Listen,
    /// List available audio input devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Interactive {
        no_voice: true,
        language: None,
    });

    match command {
        Command::Interactive { no_voice, language } => {
            let mut config = config;
            if let Some(language) = language {
                config.voice_language = language;
            }
            run_interactive(config, !no_voice).await
        }
        Command::Command { text } => {
            let mut app = App::new(config)?;
            let mut input = InputSource::Text;
            app.process_command(&text, &mut input).await?;
            Ok(())
        }
        Command::Scenarios { target } => {
            let mut app = App::new(config)?;
            app.generate_scenarios(Some(&target), None).await
        }
        Command::Playwright { target, scenarios } => {
            let mut app = App::new(config)?;
            match scenarios {
                Some(file) => app.generate_from_file(Some(&file)).await,
                None => {
                    let mut input = InputSource::Text;
                    app.generate_playwright(Some(&target), None, &mut input).await
                }
            }
        }
        Command::Review { file } => {
            let mut app = App::new(config)?;
            app.code_review(Some(&file)).await
        }
        Command::Outputs => {
            let app = App::new(config)?;
            app.list_outputs()
        }
        Command::Marker {
            project_path,
            dry_run,
        } => {
            let mut app = App::new(config)?;
            if dry_run {
                app.marker_preview(Some(&project_path)).await
            } else {
                app.marker_run(Some(&project_path)).await
            }
        }
        Command::MarkerRollback { project_path } => {
            let mut app = App::new(config)?;
            app.marker_rollback(Some(&project_path)).await
        }
        Command::MarkerAnalyze { project_path } => {
            let mut app = App::new(config)?;
            app.marker_analyze(Some(&project_path)).await
        }
        Command::Live => {
            println!("{BANNER}");
            live::run(config).await
        }
        Command::Listen => {
            let mut voice = VoiceInput::new(&config);
            voice.calibrate().await?;
            voice
                .listen_continuous(
                    |text| {
                        println!("Heard: {text}");
                        true
                    },
                    "stop listening",
                )
                .await;
            Ok(())
        }
        Command::Devices => {
            voice::list_inputs()?;
            Ok(())
        }
    }
}

async fn run_interactive(config: Config, use_voice: bool) -> Result<()> {
    println!("{BANNER}");
    println!("Say 'help' for available commands, 'exit' to quit.\n");

    let mut input = if use_voice {
        let mut voice = VoiceInput::new(&config);
        voice.calibrate().await?;
        InputSource::Voice(Box::new(voice))
    } else {
        InputSource::Text
    };

    let mut app = App::new(config)?;
    loop {
        let text = input.get_input("Waiting for command...").await?;
        if text.is_empty() {
            continue;
        }
        if !app.process_command(&text, &mut input).await? {
            break;
        }
    }
    Ok(())
}
