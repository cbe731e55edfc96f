//! LLM content agents.
//!
//! Each agent pairs a fixed system instruction with a templated task prompt
//! and forwards the pair to a generative text endpoint. Responses are
//! returned raw; nothing validates their structure. Endpoint failures
//! propagate to the caller, there is no retry or backoff.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

// The `TextGenerator` trait is the seam between agent prompt assembly and
// the concrete LLM endpoint. Tests substitute `MockTextGenerator` to check
// prompt contents without network calls. automock must run before
// async_trait desugars the method, so the mock's `returning` closures take
// plain `Result` values.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TextGenerator {
    async fn generate(&self, system_instruction: &str, prompt: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: String,
}

/// [`TextGenerator`] backed by the Gemini generateContent REST endpoint.
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, system_instruction: &str, prompt: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let body = serde_json::json!({
            "system_instruction": { "parts": [{ "text": system_instruction }] },
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<GenerateResponse>()
            .await?;

        let text = resp
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| anyhow::anyhow!("empty response from LLM"))?;

        Ok(text)
    }
}

const SCENARIO_INSTRUCTION: &str = "\
You are an expert QA architect with 15 years of experience in software testing. \
You specialize in creating thorough test scenarios that cover happy paths, edge cases, \
error handling, and security considerations. You write in Gherkin format (Given/When/Then) \
and always consider user perspective, accessibility, and real-world usage patterns.";

const PLAYWRIGHT_INSTRUCTION: &str = "\
You are a senior automation engineer specializing in Playwright and TypeScript. \
You write clean, maintainable, and robust end-to-end tests. You follow Page Object Model patterns, \
use proper selectors (preferring data-testid), implement proper waits, handle async operations, \
and include meaningful assertions. Your tests are reliable and don't have flaky behavior.";

const REVIEW_INSTRUCTION: &str = "\
You are a meticulous code reviewer with deep expertise in test automation. \
You check for proper test isolation, clear assertions, maintainability, performance, \
and adherence to testing best practices. You provide constructive feedback and suggestions \
for improvement.";

/// Generates Gherkin test scenarios.
pub struct ScenarioAgent {
    generator: Arc<dyn TextGenerator + Send + Sync>,
}

impl ScenarioAgent {
    pub fn new(generator: Arc<dyn TextGenerator + Send + Sync>) -> Self {
        Self { generator }
    }

    pub async fn generate(
        &self,
        target: &str,
        context: Option<&HashMap<String, Value>>,
    ) -> Result<String> {
        let mut context_str = String::new();
        if let Some(context) = context {
            if let Some(category) = context.get("category").and_then(Value::as_str) {
                context_str.push_str(&format!("\nCategory: {category}"));
            }
            if context
                .get("includes_validation")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                context_str.push_str("\nInclude validation scenarios");
            }
        }

        let prompt = format!(
            r#"Generate comprehensive test scenarios for: {target}
{context_str}

Requirements:
1. Use Gherkin format (Feature, Scenario, Given/When/Then)
2. Include at least 5-8 scenarios covering:
   - Happy path / main flow
   - Edge cases
   - Error handling
   - Input validation (if applicable)
   - Security considerations (if applicable)
3. Each scenario should be clear and testable
4. Include relevant tags (@smoke, @regression, etc.)
5. Add background section if there's common setup

Output the complete .feature file content."#
        );

        self.generator.generate(SCENARIO_INSTRUCTION, &prompt).await
    }
}

/// Generates Playwright TypeScript tests.
pub struct PlaywrightAgent {
    generator: Arc<dyn TextGenerator + Send + Sync>,
}

impl PlaywrightAgent {
    pub fn new(generator: Arc<dyn TextGenerator + Send + Sync>) -> Self {
        Self { generator }
    }

    pub async fn generate(&self, target: &str, scenarios: Option<&str>) -> Result<String> {
        let scenario_context = match scenarios {
            Some(s) => format!("\nBased on these scenarios:\n{s}\n"),
            None => String::new(),
        };

        let prompt = format!(
            r#"Generate Playwright TypeScript tests for: {target}
{scenario_context}

Requirements:
1. Use TypeScript with Playwright Test
2. Follow Page Object Model pattern when appropriate
3. Use data-testid selectors primarily
4. Include proper imports and test structure
5. Add beforeEach/afterEach hooks as needed
6. Use proper async/await
7. Include meaningful assertions
8. Add comments explaining complex logic
9. Handle loading states and waits properly
10. Group related tests with describe blocks

Output complete, runnable TypeScript test file(s)."#
        );

        self.generator
            .generate(PLAYWRIGHT_INSTRUCTION, &prompt)
            .await
    }
}

/// Reviews generated test code.
pub struct ReviewAgent {
    generator: Arc<dyn TextGenerator + Send + Sync>,
}

impl ReviewAgent {
    pub fn new(generator: Arc<dyn TextGenerator + Send + Sync>) -> Self {
        Self { generator }
    }

    pub async fn review(&self, code: &str) -> Result<String> {
        let prompt = format!(
            r#"Review the following test code and provide feedback:

```typescript
{code}
```

Check for:
1. Test isolation and independence
2. Proper assertions
3. Selector best practices
4. Async handling
5. Error handling
6. Code organization
7. Naming conventions
8. Potential flakiness
9. Missing edge cases
10. Performance considerations

Provide:
- Overall quality score (1-10)
- List of issues found
- Suggestions for improvement
- Improved code if needed"#
        );

        self.generator.generate(REVIEW_INSTRUCTION, &prompt).await
    }
}

/// Results of the three-step full-suite pipeline.
#[derive(Debug, Clone)]
pub struct FullSuite {
    pub scenarios: String,
    pub playwright_tests: String,
    pub review: String,
}

/// The complete agent set sharing one generator.
pub struct AgentSet {
    pub scenario: ScenarioAgent,
    pub playwright: PlaywrightAgent,
    pub review: ReviewAgent,
}

impl AgentSet {
    pub fn new(generator: Arc<dyn TextGenerator + Send + Sync>) -> Self {
        Self {
            scenario: ScenarioAgent::new(generator.clone()),
            playwright: PlaywrightAgent::new(generator.clone()),
            review: ReviewAgent::new(generator),
        }
    }

    /// Scenarios, then tests built from them, then a review of the tests.
    /// Three sequential remote calls with no rollback: if step N fails,
    /// the results of steps 1..N-1 are lost unless the caller persisted
    /// them first.
    pub async fn generate_full_suite(
        &self,
        target: &str,
        context: Option<&HashMap<String, Value>>,
    ) -> Result<FullSuite> {
        tracing::info!("full suite generation for: {target}");

        tracing::info!("step 1: generating scenarios");
        let scenarios = self.scenario.generate(target, context).await?;

        tracing::info!("step 2: generating Playwright tests");
        let playwright_tests = self
            .playwright
            .generate(target, Some(scenarios.as_str()))
            .await?;

        tracing::info!("step 3: reviewing generated tests");
        let review = self.review.review(&playwright_tests).await?;

        Ok(FullSuite {
            scenarios,
            playwright_tests,
            review,
        })
    }
}
