pub mod agent;
pub mod command;
pub mod writer;

pub use agent::{AgentSet, FullSuite, GeminiGenerator, TextGenerator};
pub use command::{CommandEnhancer, CommandParser, CommandType, ParsedCommand};
pub use writer::{OutputEntry, OutputWriter, SuitePaths};
