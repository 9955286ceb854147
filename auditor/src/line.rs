use thiserror::Error;

/// Tokens in a well-formed execution line, split on single spaces
pub const TOKEN_COUNT: usize = 15;
const COMMAND_ID: usize = 6;
const OP_TYPE: usize = 7;

#[derive(Error, Debug, PartialEq)]
pub enum LineError {
    #[error("Expected {TOKEN_COUNT} tokens, found {0}")]
    TokenCount(usize),
    #[error("Missing command id")]
    EmptyCommandId,
    #[error("Missing op type")]
    EmptyOpType,
    #[error("Missing result")]
    EmptyResult,
}

/// One execution line. Borrowed from the line it was parsed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogLine<'a> {
    pub command_id: &'a str,
    pub op_type: &'a str,
    pub result: &'a str,
}

impl<'a> LogLine<'a> {
    /// Parses a raw line, terminator included. The leading delimiter of the
    /// command id token (`{` in `{59`) and the line terminator are stripped.
    pub fn parse(line: &'a str) -> Result<Self, LineError> {
        let tokens = line.split(' ').collect::<Vec<_>>();
        if tokens.len() != TOKEN_COUNT {
            return Err(LineError::TokenCount(tokens.len()));
        }

        let mut command_id = tokens[COMMAND_ID].chars();
        command_id.next();
        let command_id = command_id.as_str();
        if command_id.is_empty() {
            return Err(LineError::EmptyCommandId);
        }

        let op_type = tokens[OP_TYPE];
        if op_type.is_empty() {
            return Err(LineError::EmptyOpType);
        }

        let result = strip_terminator(tokens[TOKEN_COUNT - 1]);
        if result.is_empty() {
            return Err(LineError::EmptyResult);
        }

        Ok(Self {
            command_id,
            op_type,
            result,
        })
    }
}

fn strip_terminator(token: &str) -> &str {
    let token = token.strip_suffix('\n').unwrap_or(token);
    token.strip_suffix('\r').unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str =
        "2019/06/10 23:26:44 Replica 1: Executed command {59 2 42 59} with seq: 80, result: 99\n";

    #[test]
    fn parses_executed_line() {
        assert_eq!(
            LogLine::parse(LINE),
            Ok(LogLine {
                command_id: "59",
                op_type: "2",
                result: "99",
            })
        );
    }

    #[test]
    fn terminator_is_optional() {
        let line = LINE.trim_end();
        assert_eq!(LogLine::parse(line).unwrap().result, "99");
        let crlf = format!("{line}\r\n");
        assert_eq!(LogLine::parse(&crlf).unwrap().result, "99");
    }

    #[test]
    fn wrong_token_count_is_rejected() {
        let short = "2019/06/10 23:26:44 Replica 1: Executed command {59 2 42 59} with seq: 80,";
        assert_eq!(LogLine::parse(short), Err(LineError::TokenCount(13)));

        let fourteen = "a b c d e f {1 2 h i j k l 99\n";
        assert_eq!(LogLine::parse(fourteen), Err(LineError::TokenCount(14)));

        let sixteen = "a b c d e f {1 2 h i j k l m n 99\n";
        assert_eq!(LogLine::parse(sixteen), Err(LineError::TokenCount(16)));
    }

    #[test]
    fn double_spaces_change_the_token_count() {
        let line = LINE.replacen("Replica ", "Replica  ", 1);
        assert_eq!(LogLine::parse(&line), Err(LineError::TokenCount(16)));
    }

    #[test]
    fn empty_fields_are_rejected() {
        assert_eq!(
            LogLine::parse("a b c d e f { 2 h i j k l m 99\n"),
            Err(LineError::EmptyCommandId)
        );
        assert_eq!(
            LogLine::parse("a b c d e f {1  h i j k l m 99\n"),
            Err(LineError::EmptyOpType)
        );
        assert_eq!(
            LogLine::parse("a b c d e f {1 2 h i j k l m \n"),
            Err(LineError::EmptyResult)
        );
    }

    #[test]
    fn empty_line() {
        assert_eq!(LogLine::parse("\n"), Err(LineError::TokenCount(1)));
    }
}
