// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait, registry, and built-in tools for the Kestrel reasoning engine.
//!
//! The tool-use loop and the multi-agent pipeline both act on the world only
//! through a [`ToolRegistry`]. Built-in tools include:
//! - [`builtin::QueryDatabaseTool`] -- filtered record lookup
//! - [`builtin::SearchDocsTool`] -- manual and troubleshooting document search
//! - [`builtin::GetStatisticsTool`] -- counts and pass rate for a period
//! - [`builtin::CalculateTool`] -- arithmetic and today's pass rate
//! - [`builtin::CompareTool`] -- two periods side by side
//! - [`builtin::AnalyzeTrendTool`] -- daily pass-rate direction

pub mod builtin;
pub mod tool;

pub use builtin::register_builtins;
pub use tool::{Tool, ToolName, ToolOutput, ToolRegistry};
