//! Navigation scripts for the simulator.
//!
//! One command per line; blank lines and lines starting with `#` are
//! skipped.
//!
//! ```text
//! go <fragment>        navigate through the detector (no argument: empty fragment)
//! external <fragment>  change the address behind the detector's back
//! tick <ms>[ms]        advance the virtual clock (at most one hour)
//! back | forward       traverse history
//! read                 report the fragment parsed from the address
//! ```

use std::time::Duration;

use thiserror::Error;

/// Longest single `tick`. Every poll interval inside a tick runs a timer.
pub const MAX_TICK_MS: u64 = 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Go(String),
    External(String),
    Tick(Duration),
    Back,
    Forward,
    Read,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("line {line}: unknown command '{command}'")]
    UnknownCommand { line: usize, command: String },

    #[error("line {line}: '{command}' expects {expected}")]
    MissingArgument {
        line: usize,
        command: &'static str,
        expected: &'static str,
    },

    #[error("line {line}: '{command}' takes no argument")]
    UnexpectedArgument { line: usize, command: &'static str },

    #[error("line {line}: invalid duration '{value}'")]
    InvalidDuration { line: usize, value: String },

    #[error("line {line}: tick of {millis}ms exceeds the {max}ms limit")]
    TickTooLong { line: usize, millis: u64, max: u64 },
}

pub fn parse_script(source: &str) -> Result<Vec<Step>, ScriptError> {
    let mut steps = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let (command, argument) = match text.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (text, ""),
        };

        let step = match command {
            "go" => Step::Go(argument.to_owned()),
            "external" => Step::External(argument.to_owned()),
            "tick" => Step::Tick(parse_duration(line, argument)?),
            "back" => no_argument(line, "back", argument, Step::Back)?,
            "forward" => no_argument(line, "forward", argument, Step::Forward)?,
            "read" => no_argument(line, "read", argument, Step::Read)?,
            other => {
                return Err(ScriptError::UnknownCommand {
                    line,
                    command: other.to_owned(),
                })
            }
        };
        steps.push(step);
    }

    Ok(steps)
}

fn no_argument(
    line: usize,
    command: &'static str,
    argument: &str,
    step: Step,
) -> Result<Step, ScriptError> {
    if argument.is_empty() {
        Ok(step)
    } else {
        Err(ScriptError::UnexpectedArgument { line, command })
    }
}

fn parse_duration(line: usize, argument: &str) -> Result<Duration, ScriptError> {
    if argument.is_empty() {
        return Err(ScriptError::MissingArgument {
            line,
            command: "tick",
            expected: "a duration in milliseconds",
        });
    }
    let digits = argument.strip_suffix("ms").unwrap_or(argument).trim();
    let millis = digits
        .parse::<u64>()
        .map_err(|_| ScriptError::InvalidDuration {
            line,
            value: argument.to_owned(),
        })?;
    if millis > MAX_TICK_MS {
        return Err(ScriptError::TickTooLong {
            line,
            millis,
            max: MAX_TICK_MS,
        });
    }
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command() {
        let script = "\
# comment
go beta
go
external  view?id=1
tick 50
tick 20ms

back
forward
read
";
        assert_eq!(
            parse_script(script).unwrap(),
            vec![
                Step::Go("beta".into()),
                Step::Go(String::new()),
                Step::External("view?id=1".into()),
                Step::Tick(Duration::from_millis(50)),
                Step::Tick(Duration::from_millis(20)),
                Step::Back,
                Step::Forward,
                Step::Read,
            ]
        );
    }

    #[test]
    fn reports_line_numbers() {
        assert_eq!(
            parse_script("go a\njump b\n").unwrap_err(),
            ScriptError::UnknownCommand {
                line: 2,
                command: "jump".into()
            }
        );
        assert_eq!(
            parse_script("tick soon").unwrap_err(),
            ScriptError::InvalidDuration {
                line: 1,
                value: "soon".into()
            }
        );
        assert!(matches!(
            parse_script("\n\ntick").unwrap_err(),
            ScriptError::MissingArgument { line: 3, .. }
        ));
        assert_eq!(
            parse_script("tick 3600001").unwrap_err(),
            ScriptError::TickTooLong {
                line: 1,
                millis: 3_600_001,
                max: MAX_TICK_MS
            }
        );
        assert_eq!(
            parse_script("tick 3600000ms").unwrap(),
            vec![Step::Tick(Duration::from_secs(3600))]
        );
        assert!(matches!(
            parse_script("back twice").unwrap_err(),
            ScriptError::UnexpectedArgument { line: 1, .. }
        ));
    }
}
