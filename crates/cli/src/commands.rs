//! Direct tool commands for `skiff call`.

use serde_json::{Map, Value, json};

use crate::error::{Error, Result};

pub const GREET_USAGE: &str = "greet <name>";
pub const CALC_USAGE: &str = "calc <add|subtract|multiply|divide> <a> <b>";

/// A parsed line from the direct tool REPL.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectCommand {
    /// Blank line.
    Empty,
    Exit,
    /// A tool call ready to send.
    Call {
        tool: &'static str,
        arguments: Map<String, Value>,
    },
}

impl DirectCommand {
    /// Parse one input line.
    ///
    /// The operation name is passed through unchecked; the server decides
    /// which operations it supports.
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, rest)) = parts.split_first() else {
            return Ok(Self::Empty);
        };

        match command {
            _ if command.eq_ignore_ascii_case("exit") => Ok(Self::Exit),
            "greet" => {
                if rest.is_empty() {
                    return Err(Error::Usage(GREET_USAGE));
                }
                Ok(Self::call("greet", json!({ "name": rest.join(" ") })))
            }
            "calc" => {
                let [operation, a, b] = rest else {
                    return Err(Error::Usage(CALC_USAGE));
                };
                let (Ok(a), Ok(b)) = (a.parse::<f64>(), b.parse::<f64>()) else {
                    return Err(Error::MalformedArgument("a and b must be numbers".into()));
                };
                Ok(Self::call(
                    "calculate",
                    json!({ "operation": operation, "a": a, "b": b }),
                ))
            }
            other => Err(Error::UnknownCommand(other.to_string())),
        }
    }

    fn call(tool: &'static str, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::Call { tool, arguments }
    }
}
