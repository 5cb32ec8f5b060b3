//! Builtin tools shipped with the crate.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::domain::models::{ToolDefinition, ToolKind};
use crate::domain::ports::ToolHandler;

/// Evaluates basic arithmetic expressions: `+ - * /` and parentheses over
/// decimal numbers.
pub struct CalculatorTool;

impl CalculatorTool {
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: "calculator".into(),
            description: "Evaluate an arithmetic expression, e.g. \"(2+3)*4\"".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "Arithmetic expression to evaluate"
                    }
                },
                "required": ["expression"]
            }),
            kind: ToolKind::Builtin,
            timeout_secs: None,
        }
    }
}

#[async_trait]
impl ToolHandler for CalculatorTool {
    async fn execute(&self, params: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let expression = params
            .get("expression")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("expression must be a string"))?;
        let value = eval_expression(expression)?;
        // Integral results serialize as integers: 2+2 -> 4, not 4.0.
        if value.fract() == 0.0 && value.abs() < 1e15 {
            #[allow(clippy::cast_possible_truncation)]
            Ok(json!(value as i64))
        } else {
            Ok(json!(value))
        }
    }
}

/// Returns the current UTC time.
pub struct CurrentTimeTool;

impl CurrentTimeTool {
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: "current_time".into(),
            description: "Get the current date and time in UTC".into(),
            parameters: json!({
                "type": "object",
                "properties": {}
            }),
            kind: ToolKind::Builtin,
            timeout_secs: None,
        }
    }
}

#[async_trait]
impl ToolHandler for CurrentTimeTool {
    async fn execute(&self, _params: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        Ok(json!({ "utc": Utc::now().to_rfc3339() }))
    }
}

/// Mock tool returning a canned result from configuration.
pub struct MockTool {
    result: serde_json::Value,
}

impl MockTool {
    pub fn new(result: serde_json::Value) -> Self {
        Self { result }
    }
}

#[async_trait]
impl ToolHandler for MockTool {
    async fn execute(&self, _params: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        Ok(self.result.clone())
    }
}

/// Recursive-descent evaluation of `+ - * /` with parentheses and unary
/// minus.
fn eval_expression(input: &str) -> anyhow::Result<f64> {
    let tokens: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pos = 0;
    let value = parse_sum(&tokens, &mut pos)?;
    if pos != tokens.len() {
        anyhow::bail!("unexpected character at position {pos}");
    }
    Ok(value)
}

fn parse_sum(tokens: &[char], pos: &mut usize) -> anyhow::Result<f64> {
    let mut value = parse_product(tokens, pos)?;
    while let Some(&op) = tokens.get(*pos) {
        match op {
            '+' => {
                *pos += 1;
                value += parse_product(tokens, pos)?;
            }
            '-' => {
                *pos += 1;
                value -= parse_product(tokens, pos)?;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_product(tokens: &[char], pos: &mut usize) -> anyhow::Result<f64> {
    let mut value = parse_atom(tokens, pos)?;
    while let Some(&op) = tokens.get(*pos) {
        match op {
            '*' => {
                *pos += 1;
                value *= parse_atom(tokens, pos)?;
            }
            '/' => {
                *pos += 1;
                let divisor = parse_atom(tokens, pos)?;
                if divisor == 0.0 {
                    anyhow::bail!("division by zero");
                }
                value /= divisor;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_atom(tokens: &[char], pos: &mut usize) -> anyhow::Result<f64> {
    match tokens.get(*pos) {
        Some('(') => {
            *pos += 1;
            let value = parse_sum(tokens, pos)?;
            if tokens.get(*pos) != Some(&')') {
                anyhow::bail!("missing closing parenthesis");
            }
            *pos += 1;
            Ok(value)
        }
        Some('-') => {
            *pos += 1;
            Ok(-parse_atom(tokens, pos)?)
        }
        Some(c) if c.is_ascii_digit() || *c == '.' => {
            let start = *pos;
            while tokens
                .get(*pos)
                .is_some_and(|c| c.is_ascii_digit() || *c == '.')
            {
                *pos += 1;
            }
            let literal: String = tokens[start..*pos].iter().collect();
            literal
                .parse::<f64>()
                .map_err(|_| anyhow::anyhow!("invalid number '{literal}'"))
        }
        Some(c) => anyhow::bail!("unexpected character '{c}'"),
        None => anyhow::bail!("unexpected end of expression"),
    }
}
