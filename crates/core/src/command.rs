//! Command parsing for voice and typed input.
//!
//! Free text is classified into a closed set of command types by an ordered
//! regex table. Declaration order of [`CommandType`] is the priority order:
//! the first matching pattern wins, there is no best-match search. Several
//! patterns overlap across types (e.g. "review" and "preview"), so the
//! declared order is a contract covered by regression tests, not a claim of
//! correct disambiguation.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};
use serde_json::{json, Value};

/// Everything the system can be asked to do.
///
/// Variant order is the pattern-priority order used by [`CommandParser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    GenerateScenarios,
    GeneratePlaywright,
    DictateScenario,
    GenerateFromFile,
    CodeReview,
    MarkerRun,
    MarkerPreview,
    MarkerRollback,
    MarkerAnalyze,
    Help,
    Exit,
    Unknown,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::GenerateScenarios => "generate_scenarios",
            CommandType::GeneratePlaywright => "generate_playwright",
            CommandType::DictateScenario => "dictate_scenario",
            CommandType::GenerateFromFile => "generate_from_file",
            CommandType::CodeReview => "code_review",
            CommandType::MarkerRun => "marker_run",
            CommandType::MarkerPreview => "marker_preview",
            CommandType::MarkerRollback => "marker_rollback",
            CommandType::MarkerAnalyze => "marker_analyze",
            CommandType::Help => "help",
            CommandType::Exit => "exit",
            CommandType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed utterance. Immutable after enhancement, discarded after dispatch.
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    pub command_type: CommandType,
    pub target: Option<String>,
    pub parameters: HashMap<String, Value>,
    pub raw_text: String,
}

impl std::fmt::Display for ParsedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Command: {}, Target: {}",
            self.command_type,
            self.target.as_deref().unwrap_or("-")
        )
    }
}

/// Pattern table, in priority order. Group 1 of a matching pattern (trimmed)
/// becomes the command target.
const PATTERNS: &[(CommandType, &[&str])] = &[
    (
        CommandType::GenerateScenarios,
        &[
            r"(?:generate|create|write)\s+(?:test\s+)?scenarios?\s+(?:for\s+)?(.+)",
            r"(?:make|build)\s+(?:test\s+)?scenarios?\s+(?:for\s+)?(.+)",
            r"scenarios?\s+(?:for\s+)?(.+)",
        ],
    ),
    (
        CommandType::GeneratePlaywright,
        &[
            r"(?:generate|create|write)\s+playwright\s+(?:tests?\s+)?(?:for\s+)?(.+)",
            r"(?:make|build)\s+playwright\s+(?:tests?\s+)?(?:for\s+)?(.+)",
            r"playwright\s+(?:tests?\s+)?(?:for\s+)?(.+)",
            r"(?:generate|create)\s+(?:e2e|end.to.end)\s+tests?\s+(?:for\s+)?(.+)",
        ],
    ),
    (
        CommandType::DictateScenario,
        &[
            r"dictate\s+(?:a\s+)?(?:test\s+)?scenario",
            r"record\s+(?:a\s+)?(?:test\s+)?scenario",
            r"start\s+dictation",
        ],
    ),
    (
        CommandType::GenerateFromFile,
        &[
            r"(?:generate|create)\s+(?:tests?\s+)?from\s+(?:file\s+)?(.+)",
            r"(?:convert|transform)\s+(?:file\s+)?(.+)\s+to\s+(?:playwright\s+)?tests?",
        ],
    ),
    (
        CommandType::CodeReview,
        &[
            r"(?:review|check)\s+(?:code\s+)?(?:in\s+)?(.+)",
            r"code\s+review\s+(?:for\s+)?(.+)",
        ],
    ),
    (
        CommandType::MarkerRun,
        &[
            r"(?:run|add|apply)\s+(?:test\s+)?(?:id|ids|marker)\s+(?:to|for|on)\s+(.+)",
            r"marker\s+(?:run|add)\s+(?:on\s+)?(.+)",
            r"add\s+test\s+ids?\s+(?:to\s+)?(.+)",
        ],
    ),
    (
        CommandType::MarkerPreview,
        &[
            r"(?:preview|show)\s+(?:test\s+)?(?:id|ids|marker)\s+(?:changes?\s+)?(?:for\s+)?(.+)",
            r"marker\s+preview\s+(.+)",
            r"dry.?run\s+marker\s+(?:on\s+)?(.+)",
        ],
    ),
    (
        CommandType::MarkerRollback,
        &[
            r"(?:rollback|undo|revert)\s+(?:test\s+)?(?:id|ids|marker)\s+(?:changes?\s+)?(?:for\s+)?(.+)?",
            r"marker\s+rollback\s*(.+)?",
        ],
    ),
    (
        CommandType::MarkerAnalyze,
        &[
            r"(?:analyze|scan)\s+(?:project\s+)?(.+)\s+(?:for\s+)?(?:test\s+)?(?:id|ids)",
            r"marker\s+analyze\s+(.+)",
        ],
    ),
    (
        CommandType::Help,
        &[r"^help$", r"^what\s+can\s+you\s+do", r"^show\s+commands?$"],
    ),
    (
        CommandType::Exit,
        &[r"^(?:exit|quit|bye|stop)$", r"^close\s+synapse$"],
    ),
];

/// Parses voice/text input into a [`ParsedCommand`].
pub struct CommandParser {
    compiled: Vec<(CommandType, Vec<Regex>)>,
}

impl CommandParser {
    pub fn new() -> Self {
        let compiled = PATTERNS
            .iter()
            .map(|(cmd, patterns)| {
                let regexes = patterns
                    .iter()
                    .map(|p| {
                        RegexBuilder::new(p)
                            .case_insensitive(true)
                            .build()
                            .unwrap_or_else(|e| panic!("invalid command pattern {p:?}: {e}"))
                    })
                    .collect();
                (*cmd, regexes)
            })
            .collect();
        Self { compiled }
    }

    /// Classify `text`. Each pattern is tried at most once; the first match
    /// wins. Unmatched non-empty input degrades to `Unknown` with the full
    /// text as target.
    pub fn parse(&self, text: &str) -> ParsedCommand {
        let text = text.trim();

        if text.is_empty() {
            return ParsedCommand {
                command_type: CommandType::Unknown,
                target: None,
                parameters: HashMap::new(),
                raw_text: text.to_string(),
            };
        }

        for (cmd_type, patterns) in &self.compiled {
            for pattern in patterns {
                if let Some(caps) = pattern.captures(text) {
                    let target = caps
                        .get(1)
                        .map(|m| m.as_str().trim())
                        .filter(|t| !t.is_empty())
                        .map(str::to_string);

                    return ParsedCommand {
                        command_type: *cmd_type,
                        target,
                        parameters: HashMap::new(),
                        raw_text: text.to_string(),
                    };
                }
            }
        }

        ParsedCommand {
            command_type: CommandType::Unknown,
            target: Some(text.to_string()),
            parameters: HashMap::new(),
            raw_text: text.to_string(),
        }
    }

    /// Human-readable command reference for the `help` intent.
    pub fn help_text(&self) -> &'static str {
        r#"Available commands:

Generate test scenarios:
  "Generate scenarios for user login"
  "Create test scenarios for shopping cart"

Generate Playwright tests:
  "Generate Playwright tests for checkout flow"
  "Create e2e tests for registration"

Dictate a scenario:
  "Dictate scenario" - record a test scenario

Generate from a file:
  "Generate tests from features/login.feature"
  "Convert scenarios.md to Playwright tests"

Code review:
  "Review code in tests/login.spec.ts"

Marker (test IDs):
  "Add test ids to /path/to/project"
  "Preview marker changes for /path"
  "Rollback marker changes for /path"
  "Analyze project /path for test ids"

Other:
  "help" - show this help
  "exit" - quit
"#
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyword groups scanned over the target, in application order. A later
/// matching group overwrites the `category` of an earlier one.
const KEYWORD_GROUPS: &[(&[&str], &str)] = &[
    (
        &["login", "auth", "signin", "signup", "register", "password"],
        "authentication",
    ),
    (
        &["cart", "checkout", "payment", "order", "product"],
        "e-commerce",
    ),
    (&["form", "input", "validation", "submit"], "forms"),
    (&["navigation", "menu", "link", "route", "page"], "navigation"),
    (&["api", "request", "response", "endpoint"], "api"),
];

/// Attaches heuristic metadata to a parsed command by keyword search over
/// the target. Commands without a target pass through unmodified.
pub struct CommandEnhancer;

impl CommandEnhancer {
    pub fn enhance(mut command: ParsedCommand) -> ParsedCommand {
        let Some(target) = command.target.as_deref() else {
            return command;
        };
        let target_lower = target.to_lowercase();

        let mut parameters = HashMap::new();
        for (keywords, category) in KEYWORD_GROUPS {
            if !keywords.iter().any(|w| target_lower.contains(w)) {
                continue;
            }
            parameters.insert("category".to_string(), json!(category));
            match *category {
                "authentication" | "e-commerce" => {
                    parameters.insert("priority".to_string(), json!("high"));
                }
                "forms" => {
                    parameters.insert("includes_validation".to_string(), json!(true));
                }
                "api" => {
                    parameters.insert("test_type".to_string(), json!("api"));
                }
                _ => {}
            }
        }

        command.parameters = parameters;
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedCommand {
        CommandParser::new().parse(text)
    }

    #[test]
    fn generate_scenarios_extracts_target() {
        let cmd = parse("generate scenarios for user login");
        assert_eq!(cmd.command_type, CommandType::GenerateScenarios);
        assert_eq!(cmd.target.as_deref(), Some("user login"));
        assert_eq!(cmd.raw_text, "generate scenarios for user login");
    }

    #[test]
    fn marker_run_extracts_path() {
        let cmd = parse("add test ids to /srv/app");
        assert_eq!(cmd.command_type, CommandType::MarkerRun);
        assert_eq!(cmd.target.as_deref(), Some("/srv/app"));
    }

    #[test]
    fn empty_input_is_unknown_without_target() {
        let cmd = parse("");
        assert_eq!(cmd.command_type, CommandType::Unknown);
        assert_eq!(cmd.target, None);
    }

    #[test]
    fn whitespace_input_is_unknown_without_target() {
        let cmd = parse("   \t  ");
        assert_eq!(cmd.command_type, CommandType::Unknown);
        assert_eq!(cmd.target, None);
    }

    #[test]
    fn unmatched_input_keeps_full_text_as_target() {
        let cmd = parse("please do something clever");
        assert_eq!(cmd.command_type, CommandType::Unknown);
        assert_eq!(cmd.target.as_deref(), Some("please do something clever"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let cmd = parse("GENERATE Playwright Tests FOR checkout");
        assert_eq!(cmd.command_type, CommandType::GeneratePlaywright);
        assert_eq!(cmd.target.as_deref(), Some("checkout"));
    }

    #[test]
    fn dictation_has_no_target() {
        let cmd = parse("dictate scenario");
        assert_eq!(cmd.command_type, CommandType::DictateScenario);
        assert_eq!(cmd.target, None);
    }

    #[test]
    fn exit_words_map_to_exit() {
        for word in ["exit", "quit", "bye", "stop"] {
            assert_eq!(parse(word).command_type, CommandType::Exit);
        }
    }

    #[test]
    fn help_phrase_maps_to_help() {
        assert_eq!(parse("help").command_type, CommandType::Help);
        assert_eq!(parse("what can you do").command_type, CommandType::Help);
    }

    // Regression: "create scenarios for playwright suite" matches a
    // GenerateScenarios pattern and a GeneratePlaywright pattern.
    // GenerateScenarios is declared first, so it must win. The declared
    // order is the contract under test.
    #[test]
    fn declaration_order_resolves_overlapping_patterns() {
        let cmd = parse("create scenarios for playwright suite");
        assert_eq!(cmd.command_type, CommandType::GenerateScenarios);
        assert_eq!(cmd.target.as_deref(), Some("playwright suite"));
    }

    #[test]
    fn preview_is_swallowed_by_review() {
        // "preview" contains "review" as a substring and patterns are
        // unanchored, so the CodeReview pattern matches inside the word.
        // CodeReview is declared before MarkerPreview and therefore wins.
        // This pins today's behavior, it does not bless it.
        let cmd = parse("preview marker changes for /srv/app");
        assert_eq!(cmd.command_type, CommandType::CodeReview);
    }

    #[test]
    fn enhancer_detects_authentication() {
        let cmd = CommandEnhancer::enhance(parse("generate scenarios for user login"));
        assert_eq!(cmd.parameters["category"], json!("authentication"));
        assert_eq!(cmd.parameters["priority"], json!("high"));
    }

    #[test]
    fn enhancer_last_matching_group_wins() {
        // "login page" matches both authentication and navigation; the
        // navigation group is applied later and overwrites category, while
        // the earlier group's priority remains (sequential overwrite, not
        // merge-safe).
        let cmd = CommandEnhancer::enhance(parse("generate scenarios for login page"));
        assert_eq!(cmd.parameters["category"], json!("navigation"));
        assert_eq!(cmd.parameters["priority"], json!("high"));
    }

    #[test]
    fn enhancer_forms_set_validation_flag() {
        let cmd = CommandEnhancer::enhance(parse("generate scenarios for contact form"));
        assert_eq!(cmd.parameters["category"], json!("forms"));
        assert_eq!(cmd.parameters["includes_validation"], json!(true));
    }

    #[test]
    fn enhancer_is_idempotent_for_single_category_targets() {
        let first = CommandEnhancer::enhance(parse("generate scenarios for checkout"));
        let second = CommandEnhancer::enhance(first.clone());
        assert_eq!(first.parameters, second.parameters);
    }

    #[test]
    fn enhancer_passes_through_commands_without_target() {
        let cmd = CommandEnhancer::enhance(parse("dictate scenario"));
        assert!(cmd.parameters.is_empty());
    }
}
