//! routewalk - recovers the HTTP surface of a Rust web service from its source.
//!
//! For every route the crate registers, the handler body is walked: calls on the request
//! context (`ctx.param("id")`, `ctx.bind_json()`, `ctx.json(200, &user)`) become path, query,
//! header and body parameters and status-coded responses, helpers that receive the context are
//! followed, and every named type met on the way is materialized into a deduplicated component
//! list.
//!
//! # Architecture
//!
//! 1. [`packages`] - lazily loaded module tree of the analyzed crate
//! 2. [`resolver`] - paths, declarations, expression values and types, calls and signatures
//! 3. [`materializer`] - static types to serializable fields, with a worklist for deferred runs
//! 4. [`discovery`] - route registrations (`.get`, `.route`, `.nest`, `.group`)
//! 5. [`walker`] - handler bodies to routes, with caller-supplied [`walker::Recognizer`]s
//! 6. [`analyzer`] - drives one run and produces the [`model::ServiceModel`]
//! 7. [`serializer`] - YAML/JSON output
//!
//! # Example Usage
//!
//! ```no_run
//! use routewalk::analyzer::Analyzer;
//! use routewalk::config::AnalyzerConfig;
//! use routewalk::serializer::serialize_yaml;
//! use std::path::Path;
//!
//! let config = AnalyzerConfig::from_project_dir(Path::new("./my-service")).unwrap();
//! let model = Analyzer::run(config).unwrap();
//! println!("{}", serialize_yaml(&model).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod materializer;
pub mod model;
pub mod packages;
pub mod parser;
pub mod resolver;
pub mod serializer;
pub mod tags;
pub mod walker;
