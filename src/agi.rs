//! AGI command text, result decoding and the AsyncAGI environment

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::{
    action::validate_no_newlines,
    constants::AGI_ENV_PREFIX,
    error::{AmiError, AmiResult},
};

/// AGI status: command ran.
pub const AGI_SUCCESS: u16 = 200;
/// AGI status: unknown command.
pub const AGI_INVALID_COMMAND: u16 = 510;
/// AGI status: channel is dead.
pub const AGI_DEAD_CHANNEL: u16 = 511;
/// AGI status: usage error.
pub const AGI_USAGE: u16 = 520;

/// Decoded AGI result line, e.g. `200 result=1 (dtmf) endpos=8000`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgiResult {
    code: u16,
    result: Option<String>,
    data: Option<String>,
    extra: HashMap<String, String>,
    text: String,
}

impl AgiResult {
    /// Decode a result string.
    ///
    /// Status 511 maps to [`AmiError::ChannelUnavailable`], 510 and 520 to
    /// [`AmiError::InvalidCommand`], any other non-200 status or an
    /// unparseable line to [`AmiError::InvalidResult`].
    ///
    /// ```
    /// use asterisk_ami_tokio::AgiResult;
    ///
    /// let r = AgiResult::parse("200 result=1 (timeout) endpos=1234\n").unwrap();
    /// assert_eq!(r.result(), Some("1"));
    /// assert_eq!(r.data(), Some("timeout"));
    /// assert_eq!(r.extra("endpos"), Some("1234"));
    /// ```
    pub fn parse(text: &str) -> AmiResult<Self> {
        let text = text.trim();
        let code = text
            .get(..3)
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| AmiError::InvalidResult(text.to_string()))?;
        let rest = text[3..].trim_start_matches([' ', '-']);

        match code {
            AGI_SUCCESS => {}
            AGI_DEAD_CHANNEL => return Err(AmiError::ChannelUnavailable(rest.to_string())),
            AGI_INVALID_COMMAND | AGI_USAGE => {
                return Err(AmiError::InvalidCommand(rest.to_string()))
            }
            _ => return Err(AmiError::InvalidResult(text.to_string())),
        }

        let mut result = None;
        let mut data = None;
        let mut extra = HashMap::new();
        let mut remaining = rest.trim();
        while !remaining.is_empty() {
            if let Some(inner) = remaining.strip_prefix('(') {
                let close = inner
                    .find(')')
                    .unwrap_or(inner.len());
                data = Some(inner[..close].to_string());
                remaining = inner
                    .get(close + 1..)
                    .unwrap_or("")
                    .trim_start();
                continue;
            }
            let end = remaining
                .find(char::is_whitespace)
                .unwrap_or(remaining.len());
            let token = &remaining[..end];
            if let Some((key, value)) = token.split_once('=') {
                if key.eq_ignore_ascii_case("result") {
                    result = Some(value.to_string());
                } else {
                    extra.insert(key.to_lowercase(), value.to_string());
                }
            }
            remaining = remaining[end..].trim_start();
        }

        Ok(Self {
            code,
            result,
            data,
            extra,
            text: text.to_string(),
        })
    }

    /// AGI status code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// `result=` value.
    pub fn result(&self) -> Option<&str> {
        self.result
            .as_deref()
    }

    /// `result=` value as an integer.
    pub fn result_int(&self) -> Option<i64> {
        self.result()?
            .parse()
            .ok()
    }

    /// Parenthesized data, e.g. the value returned by `GET VARIABLE`.
    pub fn data(&self) -> Option<&str> {
        self.data
            .as_deref()
    }

    /// Other `key=value` tokens such as `endpos`.
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra
            .get(&key.to_lowercase())
            .map(|s| s.as_str())
    }

    /// The trimmed result line.
    pub fn text(&self) -> &str {
        &self.text
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Typed AGI commands.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AgiCommand {
    /// `ANSWER`
    Answer,
    /// `HANGUP [channel]`
    Hangup { channel: Option<String> },
    /// `EXEC <application> "<options>"`
    Exec { application: String, options: String },
    /// `GET VARIABLE <name>`
    GetVariable { name: String },
    /// `SET VARIABLE <name> "<value>"`
    SetVariable { name: String, value: String },
    /// `STREAM FILE <file> "<escape digits>"`
    StreamFile { file: String, escape_digits: String },
    /// `VERBOSE "<message>" <level>`
    Verbose { message: String, level: u8 },
    /// `NOOP`
    Noop,
    /// `ASYNCAGI BREAK`
    AsyncBreak,
}

impl AgiCommand {
    /// Validate all user-supplied fields, then render the command line.
    pub fn to_wire_format(&self) -> AmiResult<String> {
        match self {
            AgiCommand::Answer => Ok("ANSWER".to_string()),
            AgiCommand::Hangup { channel: None } => Ok("HANGUP".to_string()),
            AgiCommand::Hangup {
                channel: Some(channel),
            } => {
                validate_no_newlines(channel, "channel")?;
                Ok(format!("HANGUP {}", channel))
            }
            AgiCommand::Exec {
                application,
                options,
            } => {
                validate_no_newlines(application, "application")?;
                validate_no_newlines(options, "application options")?;
                Ok(format!("EXEC {} {}", application, quote(options)))
            }
            AgiCommand::GetVariable { name } => {
                validate_no_newlines(name, "variable name")?;
                Ok(format!("GET VARIABLE {}", name))
            }
            AgiCommand::SetVariable { name, value } => {
                validate_no_newlines(name, "variable name")?;
                validate_no_newlines(value, "variable value")?;
                Ok(format!("SET VARIABLE {} {}", name, quote(value)))
            }
            AgiCommand::StreamFile {
                file,
                escape_digits,
            } => {
                validate_no_newlines(file, "file")?;
                validate_no_newlines(escape_digits, "escape digits")?;
                Ok(format!("STREAM FILE {} {}", file, quote(escape_digits)))
            }
            AgiCommand::Verbose { message, level } => {
                validate_no_newlines(message, "message")?;
                Ok(format!("VERBOSE {} {}", quote(message), level))
            }
            AgiCommand::Noop => Ok("NOOP".to_string()),
            AgiCommand::AsyncBreak => Ok(crate::constants::ASYNCAGI_BREAK.to_string()),
        }
    }
}

impl fmt::Display for AgiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_wire_format() {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "<invalid {:?}>", self),
        }
    }
}

/// Variables announced in the `Env` key of an `AsyncAGIStart` event.
///
/// Keys are lower-cased with the `agi_` prefix removed (`agi_callerid` is
/// available as `callerid`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgiEnvironment {
    variables: HashMap<String, String>,
}

impl AgiEnvironment {
    /// Parse an already percent-decoded environment block.
    ///
    /// Reading stops at the first blank line.
    pub fn parse(env: &str) -> Self {
        let mut variables = HashMap::new();
        for line in env.split('\n') {
            let line = line.trim_end_matches('\r');
            if line
                .trim()
                .is_empty()
            {
                break;
            }
            let Some((key, value)) = line.split_once(':') else {
                warn!("Ignoring AGI environment line without colon: {}", line);
                continue;
            };
            let key = key
                .trim()
                .to_lowercase();
            let key = key
                .strip_prefix(AGI_ENV_PREFIX)
                .unwrap_or(&key)
                .to_string();
            variables.insert(key, value.trim().to_string());
        }
        Self { variables }
    }

    /// Variable by name, with or without the `agi_` prefix.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        let name = name
            .strip_prefix(AGI_ENV_PREFIX)
            .unwrap_or(&name);
        self.variables
            .get(name)
            .map(|s| s.as_str())
    }

    /// All variables.
    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    /// `agi_channel`.
    pub fn channel(&self) -> Option<&str> {
        self.get("channel")
    }

    /// `agi_request` (`async` for AsyncAGI).
    pub fn request(&self) -> Option<&str> {
        self.get("request")
    }

    /// `agi_uniqueid`.
    pub fn unique_id(&self) -> Option<&str> {
        self.get("uniqueid")
    }

    /// `agi_callerid`.
    pub fn caller_id(&self) -> Option<&str> {
        self.get("callerid")
    }

    /// `agi_calleridname`.
    pub fn caller_id_name(&self) -> Option<&str> {
        self.get("calleridname")
    }

    /// `agi_context`.
    pub fn context(&self) -> Option<&str> {
        self.get("context")
    }

    /// `agi_extension`.
    pub fn extension(&self) -> Option<&str> {
        self.get("extension")
    }

    /// `agi_priority`.
    pub fn priority(&self) -> Option<&str> {
        self.get("priority")
    }

    /// `agi_language`.
    pub fn language(&self) -> Option<&str> {
        self.get("language")
    }

    /// `agi_arg_1`, `agi_arg_2`, ... in order, stopping at the first gap.
    pub fn arguments(&self) -> Vec<&str> {
        (1..)
            .map_while(|i| self.get(&format!("arg_{}", i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_ok() {
        let r = AgiResult::parse(" 200 OK \n").unwrap();
        assert_eq!(r.code(), 200);
        assert_eq!(r.text(), "200 OK");
        assert_eq!(r.result(), None);
    }

    #[test]
    fn test_parse_result_and_data() {
        let r = AgiResult::parse("200 result=1 (SIP/100-0001)").unwrap();
        assert_eq!(r.result_int(), Some(1));
        assert_eq!(r.data(), Some("SIP/100-0001"));
    }

    #[test]
    fn test_parse_data_with_spaces() {
        let r = AgiResult::parse("200 result=1 (hello world) endpos=42").unwrap();
        assert_eq!(r.data(), Some("hello world"));
        assert_eq!(r.extra("ENDPOS"), Some("42"));
    }

    #[test]
    fn test_parse_negative_result() {
        let r = AgiResult::parse("200 result=-1").unwrap();
        assert_eq!(r.result_int(), Some(-1));
    }

    #[test]
    fn test_parse_error_codes() {
        assert!(matches!(
            AgiResult::parse("511 Command Not Permitted on a dead channel"),
            Err(AmiError::ChannelUnavailable(msg)) if msg == "Command Not Permitted on a dead channel"
        ));
        assert!(matches!(
            AgiResult::parse("510 Invalid or unknown command"),
            Err(AmiError::InvalidCommand(_))
        ));
        assert!(matches!(
            AgiResult::parse("520-Invalid command syntax.  Proper usage follows:"),
            Err(AmiError::InvalidCommand(msg)) if msg.starts_with("Invalid command syntax")
        ));
        assert!(matches!(
            AgiResult::parse("nonsense"),
            Err(AmiError::InvalidResult(_))
        ));
        assert!(matches!(
            AgiResult::parse("503 weird"),
            Err(AmiError::InvalidResult(_))
        ));
    }

    #[test]
    fn test_command_wire_format() {
        assert_eq!(AgiCommand::Answer.to_string(), "ANSWER");
        assert_eq!(
            AgiCommand::Exec {
                application: "Dial".into(),
                options: "SIP/100,30".into(),
            }
            .to_wire_format()
            .unwrap(),
            "EXEC Dial \"SIP/100,30\""
        );
        assert_eq!(
            AgiCommand::SetVariable {
                name: "FOO".into(),
                value: "say \"hi\"".into(),
            }
            .to_wire_format()
            .unwrap(),
            "SET VARIABLE FOO \"say \\\"hi\\\"\""
        );
        assert_eq!(
            AgiCommand::Verbose {
                message: "hello".into(),
                level: 3,
            }
            .to_wire_format()
            .unwrap(),
            "VERBOSE \"hello\" 3"
        );
        assert_eq!(
            AgiCommand::AsyncBreak
                .to_wire_format()
                .unwrap(),
            "ASYNCAGI BREAK"
        );
    }

    #[test]
    fn test_command_rejects_newlines() {
        let cmd = AgiCommand::GetVariable {
            name: "A\nANSWER".into(),
        };
        assert!(matches!(
            cmd.to_wire_format(),
            Err(AmiError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_environment_parse() {
        let env = "agi_request: async\n\
                   agi_channel: SIP/100-0001\n\
                   agi_callerid: 100\n\
                   agi_arg_1: first\n\
                   agi_arg_2: sec:ond\n\
                   \n\
                   agi_after_end: ignored\n";
        let env = AgiEnvironment::parse(env);
        assert_eq!(env.request(), Some("async"));
        assert_eq!(env.channel(), Some("SIP/100-0001"));
        assert_eq!(env.get("agi_callerid"), Some("100"));
        assert_eq!(env.arguments(), vec!["first", "sec:ond"]);
        assert_eq!(env.get("after_end"), None);
    }
}
