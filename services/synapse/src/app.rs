//! Command dispatch.
//!
//! Every parsed command goes through one exhaustive match. Target validation
//! happens before any collaborator is touched; the agent set and the Marker
//! client are built lazily and cached for the life of the process.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use serde_json::Value;
use synapse_core::{
    AgentSet, CommandEnhancer, CommandParser, CommandType, GeminiGenerator, OutputWriter,
};
use synapse_rpc::MarkerClient;

use crate::config::Config;
use crate::voice::InputSource;

pub struct App {
    config: Config,
    parser: CommandParser,
    writer: OutputWriter,
    agents: Option<AgentSet>,
    marker: Option<MarkerClient>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let writer = OutputWriter::new(&config.output_dir)?;
        Ok(Self {
            config,
            parser: CommandParser::new(),
            writer,
            agents: None,
            marker: None,
        })
    }

    pub fn help_text(&self) -> &'static str {
        self.parser.help_text()
    }

    /// Parses, enhances and executes one command. Returns `false` when the
    /// interactive loop should end. Handler errors are printed, never
    /// propagated, so one bad command does not end the session.
    pub async fn process_command(&mut self, text: &str, input: &mut InputSource) -> Result<bool> {
        let command = CommandEnhancer::enhance(self.parser.parse(text));
        println!("{command}");

        match command.command_type {
            CommandType::Exit => {
                println!("Goodbye!");
                return Ok(false);
            }
            CommandType::Help => println!("{}", self.help_text()),
            CommandType::GenerateScenarios => {
                if let Err(e) = self
                    .generate_scenarios(command.target.as_deref(), Some(&command.parameters))
                    .await
                {
                    print_error(&format!("Error generating scenarios: {e:#}"));
                }
            }
            CommandType::GeneratePlaywright => {
                if let Err(e) = self
                    .generate_playwright(command.target.as_deref(), Some(&command.parameters), input)
                    .await
                {
                    print_error(&format!("Error generating tests: {e:#}"));
                }
            }
            CommandType::DictateScenario => {
                if let Err(e) = self.dictate_scenario(input).await {
                    print_error(&format!("Error processing dictation: {e:#}"));
                }
            }
            CommandType::GenerateFromFile => {
                if let Err(e) = self.generate_from_file(command.target.as_deref()).await {
                    print_error(&format!("Error processing file: {e:#}"));
                }
            }
            CommandType::CodeReview => {
                if let Err(e) = self.code_review(command.target.as_deref()).await {
                    print_error(&format!("Error reviewing code: {e:#}"));
                }
            }
            CommandType::MarkerRun => {
                if let Err(e) = self.marker_run(command.target.as_deref()).await {
                    print_error(&format!("Error running Marker: {e:#}"));
                }
            }
            CommandType::MarkerPreview => {
                if let Err(e) = self.marker_preview(command.target.as_deref()).await {
                    print_error(&format!("Error previewing: {e:#}"));
                }
            }
            CommandType::MarkerRollback => {
                if let Err(e) = self.marker_rollback(command.target.as_deref()).await {
                    print_error(&format!("Error rolling back: {e:#}"));
                }
            }
            CommandType::MarkerAnalyze => {
                if let Err(e) = self.marker_analyze(command.target.as_deref()).await {
                    print_error(&format!("Error analyzing: {e:#}"));
                }
            }
            CommandType::Unknown => {
                println!("Unknown command. Processing as general request...");
                if let Err(e) = self.general_request(text).await {
                    print_error(&format!("Error: {e:#}"));
                }
            }
        }
        Ok(true)
    }

    pub async fn generate_scenarios(
        &mut self,
        target: Option<&str>,
        context: Option<&HashMap<String, Value>>,
    ) -> Result<()> {
        let Some(target) = non_empty(target) else {
            print_error("Please specify what to generate scenarios for.");
            return Ok(());
        };
        let target = target.to_string();

        let agents = self.agents()?;
        let result = agents.scenario.generate(&target, context).await?;
        self.writer.save_scenarios(&result, &target)?;
        print_panel("Generated Scenarios", &result);
        Ok(())
    }

    pub async fn generate_playwright(
        &mut self,
        target: Option<&str>,
        context: Option<&HashMap<String, Value>>,
        input: &mut InputSource,
    ) -> Result<()> {
        let Some(target) = non_empty(target) else {
            print_error("Please specify what to generate tests for.");
            return Ok(());
        };
        let target = target.to_string();

        println!("Generate test scenarios first? (yes/no)");
        let response = input.get_input("Yes or No?").await?.to_lowercase();

        let agents = self.agents()?;
        if response.starts_with('y') {
            let suite = agents.generate_full_suite(&target, context).await?;
            let paths = self.writer.save_full_suite(&suite, &target)?;
            print_panel(
                "Full Test Suite Generated",
                &format!(
                    "Generated files:\n- {}\n- {}\n- {}",
                    paths.scenarios.display(),
                    paths.tests.display(),
                    paths.review.display()
                ),
            );
        } else {
            let result = agents.playwright.generate(&target, None).await?;
            self.writer.save_playwright_tests(&result, &target)?;
            print_panel("Generated Playwright Tests", &result);
        }
        Ok(())
    }

    pub async fn dictate_scenario(&mut self, input: &mut InputSource) -> Result<()> {
        println!("Dictation mode. Describe your test scenario.");
        let scenario = input.dictate().await?;
        if scenario.is_empty() {
            return Ok(());
        }
        println!("\nRecorded scenario:\n{scenario}");

        println!("\nGenerate Playwright tests from this scenario? (yes/no)");
        let response = input.get_input("Yes or No?").await?.to_lowercase();
        if !response.starts_with('y') {
            return Ok(());
        }

        let agents = self.agents()?;
        let result = agents
            .playwright
            .generate("dictated scenario", Some(scenario.as_str()))
            .await?;
        self.writer.save_playwright_tests(&result, "dictated_scenario")?;
        print_panel("Generated Tests", &result);
        Ok(())
    }

    pub async fn generate_from_file(&mut self, filepath: Option<&str>) -> Result<()> {
        let Some(filepath) = non_empty(filepath) else {
            print_error("Please specify the file path.");
            return Ok(());
        };
        let path = Path::new(filepath);
        if !path.exists() {
            print_error(&format!("File not found: {filepath}"));
            return Ok(());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {filepath}"))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filepath.to_string());
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "from_file".to_string());

        let agents = self.agents()?;
        let result = agents
            .playwright
            .generate(&format!("from file {name}"), Some(content.as_str()))
            .await?;
        self.writer.save_playwright_tests(&result, &stem)?;
        print_panel("Generated Tests", &result);
        Ok(())
    }

    pub async fn code_review(&mut self, target: Option<&str>) -> Result<()> {
        let Some(target) = non_empty(target) else {
            print_error("Please specify the file to review.");
            return Ok(());
        };
        let path = Path::new(target);
        if !path.exists() {
            print_error(&format!("File not found: {target}"));
            return Ok(());
        }

        let code =
            std::fs::read_to_string(path).with_context(|| format!("failed to read {target}"))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "review".to_string());

        let agents = self.agents()?;
        let result = agents.review.review(&code).await?;
        self.writer.save_review(&result, &stem)?;
        print_panel("Code Review", &result);
        Ok(())
    }

    async fn general_request(&mut self, text: &str) -> Result<()> {
        let text = text.to_string();
        let agents = self.agents()?;
        let result = agents.scenario.generate(&text, None).await?;
        self.writer.save_scenarios(&result, "general_request")?;
        print_panel("Generated Response", &result);
        Ok(())
    }

    pub async fn marker_run(&mut self, target: Option<&str>) -> Result<()> {
        let Some(target) = non_empty(target) else {
            print_error("Please specify the project path.");
            return Ok(());
        };
        let target = target.to_string();

        let marker = self.marker().await?;
        println!("Running Marker on: {target}");
        let result = marker.run_marker(&target, false, "", &[]).await;

        match result.data {
            Some(summary) if result.success => {
                let mut body = format!(
                    "Files processed: {}\nIDs added: {}",
                    summary.files_processed, summary.ids_added
                );
                if !summary.duplicate_ids.is_empty() {
                    body.push_str(&format!(
                        "\nDuplicate IDs: {}",
                        summary.duplicate_ids.join(", ")
                    ));
                }
                print_panel("Marker Complete", &body);
            }
            _ => print_error(&format!("Marker failed: {}", result.error_message())),
        }
        Ok(())
    }

    pub async fn marker_preview(&mut self, target: Option<&str>) -> Result<()> {
        let Some(target) = non_empty(target) else {
            print_error("Please specify the project path.");
            return Ok(());
        };
        let target = target.to_string();

        let marker = self.marker().await?;
        println!("Previewing Marker changes for: {target}");
        let result = marker.preview_changes(&target, "").await;

        match result.data {
            Some(summary) if result.success => {
                print_panel(
                    "Marker Preview",
                    &format!(
                        "Files found: {}\nPotential IDs: {}",
                        summary.files_found, summary.potential_ids
                    ),
                );
                for preview in summary.previews.iter().take(5) {
                    println!("\n{} ({} IDs)", preview.file_path, preview.potential_ids);
                    for element in preview.elements.iter().take(3) {
                        println!("  - {}: {}", element.element_type, element.test_id);
                    }
                }
            }
            _ => print_error(&format!("Preview failed: {}", result.error_message())),
        }
        Ok(())
    }

    pub async fn marker_rollback(&mut self, target: Option<&str>) -> Result<()> {
        let Some(target) = non_empty(target) else {
            print_error("No project specified. Please specify the project path to rollback.");
            return Ok(());
        };
        let target = target.to_string();

        let marker = self.marker().await?;
        println!("Rolling back Marker changes for: {target}");
        let result = marker.rollback(&target).await;

        match result.data {
            Some(summary) if result.success => {
                print_panel(
                    "Rollback Complete",
                    &format!("Files restored: {}", summary.files_restored),
                );
            }
            _ => print_error(&format!("Rollback failed: {}", result.error_message())),
        }
        Ok(())
    }

    pub async fn marker_analyze(&mut self, target: Option<&str>) -> Result<()> {
        let Some(target) = non_empty(target) else {
            print_error("Please specify the project path.");
            return Ok(());
        };
        let target = target.to_string();

        let marker = self.marker().await?;
        println!("Analyzing project: {target}");
        let result = marker.analyze_project(&target).await;

        match result.data {
            Some(summary) if result.success => {
                println!("\nProject Analysis");
                println!("  Total files: {}", summary.total_files);
                let mut types: Vec<_> = summary.file_types.iter().collect();
                types.sort();
                for (ext, count) in types {
                    println!("  {ext} files: {count}");
                }
            }
            _ => print_error(&format!("Analysis failed: {}", result.error_message())),
        }
        Ok(())
    }

    pub fn list_outputs(&self) -> Result<()> {
        let entries = self.writer.list_outputs()?;
        if entries.is_empty() {
            println!("No output files yet.");
            return Ok(());
        }

        println!("Generated files:");
        for entry in entries {
            println!(
                "  {:<40} {:>8} bytes  {}",
                entry.name,
                entry.size,
                age(entry.modified)
            );
        }
        Ok(())
    }

    fn agents(&mut self) -> Result<&AgentSet> {
        if self.agents.is_none() {
            let api_key = self.config.require_api_key()?.expose_secret().to_string();
            println!("Initializing AI agents...");
            let generator = Arc::new(GeminiGenerator::new(
                api_key,
                self.config.gemini_model.clone(),
            ));
            self.agents = Some(AgentSet::new(generator));
            println!("AI agents ready.");
        }
        self.agents.as_ref().context("agent set not initialized")
    }

    async fn marker(&mut self) -> Result<&mut MarkerClient> {
        if self.marker.is_none() {
            println!("Connecting to Marker service...");
            let client = MarkerClient::connect(&self.config.marker_endpoint)
                .await
                .context("failed to connect to Marker; is the gRPC server running?")?;
            println!("Marker service connected.");
            self.marker = Some(client);
        }
        self.marker.as_mut().context("marker client not connected")
    }
}

fn non_empty(target: Option<&str>) -> Option<&str> {
    target.map(str::trim).filter(|t| !t.is_empty())
}

fn print_panel(title: &str, body: &str) {
    let rule = "-".repeat(60);
    println!("\n--- {title} {}", &rule[..rule.len().saturating_sub(title.len() + 5)]);
    println!("{body}");
    println!("{rule}\n");
}

fn print_error(message: &str) {
    eprintln!("{message}");
}

fn age(modified: SystemTime) -> String {
    match modified.elapsed() {
        Ok(elapsed) => {
            let secs = elapsed.as_secs();
            if secs < 60 {
                format!("{secs}s ago")
            } else if secs < 3600 {
                format!("{}m ago", secs / 60)
            } else if secs < 86400 {
                format!("{}h ago", secs / 3600)
            } else {
                format!("{}d ago", secs / 86400)
            }
        }
        Err(_) => "in the future".to_string(),
    }
}
