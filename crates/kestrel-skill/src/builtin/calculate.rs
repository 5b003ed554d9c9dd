// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Arithmetic tool.
//!
//! Evaluates `+ - * / ( )` over decimal numbers with a small recursive
//! descent parser. Input mentioning "pass rate" is answered from today's
//! statistics instead. Nothing else is evaluated.

use std::sync::Arc;

use async_trait::async_trait;
use kestrel_core::{KestrelError, Period, RecordStore};

use crate::tool::{Tool, ToolName, ToolOutput};

/// Maximum parenthesis nesting accepted by the parser.
const MAX_DEPTH: usize = 32;

pub struct CalculateTool {
    records: Arc<dyn RecordStore>,
}

impl CalculateTool {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl Tool for CalculateTool {
    fn name(&self) -> ToolName {
        ToolName::Calculate
    }

    fn description(&self) -> &str {
        "Evaluate arithmetic such as (45 / 50) * 100, or \"pass rate\" for today's pass rate"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "string",
            "description": "an arithmetic expression using + - * / and parentheses"
        })
    }

    async fn invoke(&self, input: &str) -> Result<ToolOutput, KestrelError> {
        let lower = input.to_lowercase();
        if lower.contains("pass rate") || lower.contains("pass_rate") {
            let stats = self.records.get_statistics(Period::Today).await?;
            if stats.total == 0 {
                return Ok(ToolOutput::ok("No data to calculate pass rate"));
            }
            return Ok(ToolOutput::ok(format!(
                "Pass rate: {:.1}% ({}/{})",
                stats.pass_rate, stats.pass, stats.total
            )));
        }

        let value = evaluate(input).map_err(|message| KestrelError::Tool {
            message: format!("cannot evaluate '{}': {message}", input.trim()),
            source: None,
        })?;
        Ok(ToolOutput::ok(format!("Result: {}", format_number(value))))
    }
}

/// Evaluates an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64, String> {
    if let Some(bad) = expression
        .chars()
        .find(|c| !(c.is_ascii_digit() || c.is_whitespace() || "+-*/().".contains(*c)))
    {
        return Err(format!("unsupported character '{bad}'"));
    }

    let mut parser = Parser {
        chars: expression.chars().collect(),
        pos: 0,
        depth: 0,
    };
    if parser.peek().is_none() {
        return Err("empty expression".into());
    }
    let value = parser.expression()?;
    if let Some(c) = parser.peek() {
        return Err(format!("unexpected '{c}'"));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".into());
    }
    Ok(value)
}

/// Integers print bare; other values keep up to four decimals.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let text = format!("{value:.4}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Next non-whitespace character, without consuming it.
    fn peek(&mut self) -> Option<char> {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
        self.chars.get(self.pos).copied()
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            if op == '+' {
                value += rhs;
            } else {
                value -= rhs;
            }
        }
        Ok(value)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.factor()?;
        while let Some(op @ ('*' | '/')) = self.peek() {
            self.pos += 1;
            let rhs = self.factor()?;
            if op == '*' {
                value *= rhs;
            } else {
                if rhs == 0.0 {
                    return Err("division by zero".into());
                }
                value /= rhs;
            }
        }
        Ok(value)
    }

    // factor := '-' factor | '+' factor | '(' expression ')' | number
    fn factor(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                self.nested(|p| p.factor()).map(|v| -v)
            }
            Some('+') => {
                self.pos += 1;
                self.nested(|p| p.factor())
            }
            Some('(') => {
                self.pos += 1;
                let value = self.nested(|p| p.expression())?;
                if self.peek() != Some(')') {
                    return Err("missing ')'".into());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(format!("unexpected '{c}'")),
            None => Err("unexpected end of expression".into()),
        }
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<f64, String>) -> Result<f64, String> {
        if self.depth >= MAX_DEPTH {
            return Err("expression nested too deeply".into());
        }
        self.depth += 1;
        let value = f(self);
        self.depth -= 1;
        value
    }

    fn number(&mut self) -> Result<f64, String> {
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_digit() || *c == '.')
        {
            self.pos += 1;
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|_| format!("invalid number '{literal}'"))
    }
}
