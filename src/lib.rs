//! # quiz-chain
//!
//! Autonomous quiz-chain solver served over HTTP.
//!
//! A caller posts a seed task URL; the service runs one chain: a model reads
//! the task page through tools, submits an answer, and the server's reply
//! decides whether to retry, move on to the proposed next task, or stop.
//!
//! ## Architecture
//!
//! ```text
//!   POST /solve ──▶ ChainRunner ──▶ ChainDriver ◀──── SubmissionPolicy
//!                                   │        │
//!                          LlmSolver│        │SubmissionClient
//!                                   ▼        ▼
//!                        LlmClient + ToolBox  quiz endpoint
//! ```
//!
//! ## Modules
//! - `chain`: task registry, submission policy and the chain driver
//! - `agent`: model ↔ tool loop producing submissions
//! - `submit`: payload normalization, HTTP submission, outcome classification
//! - `llm`: chat-completions client and conversation trimming
//! - `tools`: tool requests the model can make
//! - `api`: HTTP service

pub mod agent;
pub mod api;
pub mod chain;
pub mod clock;
pub mod config;
pub mod llm;
pub mod runner;
pub mod submit;
pub mod tools;
pub mod util;

pub use config::Config;
