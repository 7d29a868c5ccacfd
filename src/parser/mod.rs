// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Whitespace/comment/quote/escape-aware tokenizer, grounded on
//! `c3_parser.cc`/`c3_parser.h`. Shared by config-file parsing (batch
//! mode) and interactive administrative `SET` (interactive mode).

pub mod wildcard;

use anyhow::{Result, bail};

/// Maximum arguments per command invocation.
pub const PARSER_MAX_ARGS: usize = 16;
/// Maximum decoded-argument bytes per command invocation.
pub const PARSER_TOTAL_ARGS_SIZE: usize = 4096;

/// A setter callback: receives the decoded argument tokens, returns
/// success. Failure triggers `on_set_error`.
pub type SetProc = Box<dyn Fn(&[String]) -> bool + Send + Sync>;
/// A getter callback: writes its value into the supplied buffer, returning
/// the number of bytes written, or a negative value if unavailable.
pub type GetProc = Box<dyn Fn(&mut Vec<u8>) -> i64 + Send + Sync>;

pub struct Command {
    pub name: &'static str,
    pub set: Option<SetProc>,
    pub get: Option<GetProc>,
}

impl Command {
    pub fn new_set(name: &'static str, set: SetProc) -> Self {
        Command {
            name,
            set: Some(set),
            get: None,
        }
    }
}

/// Callbacks invoked when a command lookup or dispatch fails, mirroring
/// the reference source's virtual `on_unknown_set`/`on_set_error`/
/// `on_unknown_get`/`on_get_error` hooks. Default implementations are
/// silent no-ops, leaving diagnostics to a caller that actually cares.
pub trait ParserCallbacks {
    fn on_unknown_set(&mut self, _name: &str, _args: &[String]) {}
    fn on_set_error(&mut self, _name: &str, _args: &[String]) {}
    fn on_unknown_get(&mut self, _name: &str) {}
    fn on_get_error(&mut self, _name: &str) {}
}

pub struct SilentCallbacks;
impl ParserCallbacks for SilentCallbacks {}

/// A parse run: owns the sorted command table and tracks source name,
/// line number, nesting level, and interactive flag across one `parse`
/// call.
pub struct Parser {
    commands: Vec<Command>,
    what: String,
    line: u32,
    nesting_level: u32,
    interactive: bool,
}

impl Parser {
    /// Sorts `commands` by name once, up front, the way
    /// `initialize_commands` sorts the static table so `find_command` can
    /// binary-search it.
    pub fn new(mut commands: Vec<Command>) -> Self {
        commands.sort_by(|a, b| a.name.cmp(b.name));
        Parser {
            commands,
            what: String::new(),
            line: 1,
            nesting_level: 0,
            interactive: false,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn nesting_level(&self) -> u32 {
        self.nesting_level
    }

    pub fn source_name(&self) -> &str {
        &self.what
    }

    pub fn line_number(&self) -> u32 {
        self.line
    }

    fn find_command(&self, name: &str) -> Option<usize> {
        self.commands
            .binary_search_by(|c| c.name.cmp(name))
            .ok()
    }

    /// Parses `buffer` as `what` (a file path, or `"<set-command>"` for
    /// interactive input), dispatching each recognized command to its
    /// setter. Unknown commands and failed setters are reported through
    /// `callbacks`; the residual arguments of an unknown command are still
    /// consumed so the line count stays correct.
    pub fn parse(
        &mut self,
        what: &str,
        buffer: &[u8],
        interactive: bool,
        callbacks: &mut dyn ParserCallbacks,
    ) -> Result<()> {
        self.what = what.to_string();
        self.line = 1;
        self.interactive = interactive;

        let mut pos = 0usize;
        loop {
            pos = self.skip_ws(buffer, pos);
            if pos >= buffer.len() {
                break;
            }
            let (name, next) = self.read_bare_token(buffer, pos);
            pos = next;
            let mut args: Vec<String> = Vec::new();
            let mut total_len = 0usize;
            loop {
                let (more, next) = self.skip_line_ws(buffer, pos);
                pos = next;
                if !more {
                    break;
                }
                if pos >= buffer.len() || buffer[pos] == b'\n' || buffer[pos] == b'\r' {
                    break;
                }
                match self.get_token(buffer, pos) {
                    Ok((token, next)) => {
                        pos = next;
                        if args.len() >= PARSER_MAX_ARGS {
                            bail!(
                                "{}:{}: too many arguments to '{}' (max {})",
                                self.what,
                                self.line,
                                name,
                                PARSER_MAX_ARGS
                            );
                        }
                        total_len += token.len();
                        if total_len > PARSER_TOTAL_ARGS_SIZE {
                            bail!(
                                "{}:{}: argument text for '{}' exceeds {} bytes",
                                self.what,
                                self.line,
                                name,
                                PARSER_TOTAL_ARGS_SIZE
                            );
                        }
                        args.push(token);
                    },
                    Err(e) => {
                        tracing::error!(source = %self.what, line = self.line, error = %e, "parser: bad token");
                        break;
                    },
                }
            }

            match self.find_command(&name) {
                Some(idx) => {
                    let ok = match &self.commands[idx].set {
                        Some(set) => set(&args),
                        None => false,
                    };
                    if !ok {
                        callbacks.on_set_error(&name, &args);
                    }
                },
                None => {
                    callbacks.on_unknown_set(&name, &args);
                },
            }

            pos = self.skip_to_eol(buffer, pos);
        }
        Ok(())
    }

    pub fn query(&mut self, name: &str, buf: &mut Vec<u8>, callbacks: &mut dyn ParserCallbacks) -> i64 {
        match self.find_command(name) {
            Some(idx) => match &self.commands[idx].get {
                Some(get) => {
                    let n = get(buf);
                    if n < 0 {
                        callbacks.on_get_error(name);
                    }
                    n
                },
                None => {
                    callbacks.on_get_error(name);
                    -1
                },
            },
            None => {
                callbacks.on_unknown_get(name);
                -1
            },
        }
    }

    /// Scans the sorted command table, invoking `callback` for every name
    /// matching `mask` (case-insensitive shell wildcard) in ascending
    /// order. Returns the number of matches; `callback` returning `false`
    /// aborts enumeration early.
    pub fn enumerate(&self, mask: &str, mut callback: impl FnMut(&str) -> bool) -> usize {
        let mut matched = 0;
        for command in &self.commands {
            if wildcard::matches(mask, command.name) {
                matched += 1;
                if !callback(command.name) {
                    break;
                }
            }
        }
        matched
    }

    // --- lexer internals -------------------------------------------------

    /// Skips whitespace, `#`-comments, and counts newlines. Returns the
    /// new position. A newline with nothing after it (the buffer's final
    /// trailing newline) doesn't start a new line of content, so it
    /// doesn't bump the counter either — `line_number()` then reports the
    /// line the last command was on, not one past it.
    fn skip_ws(&mut self, buffer: &[u8], mut pos: usize) -> usize {
        while pos < buffer.len() {
            match buffer[pos] {
                b'#' => {
                    while pos < buffer.len() && buffer[pos] != b'\n' {
                        pos += 1;
                    }
                },
                b'\r' => {
                    pos += 1;
                    if pos < buffer.len() && buffer[pos] == b'\n' {
                        pos += 1;
                    }
                    if pos < buffer.len() {
                        self.line += 1;
                    }
                },
                b'\n' => {
                    pos += 1;
                    if pos < buffer.len() {
                        self.line += 1;
                    }
                },
                b' ' | b'\t' | 0x0b => {
                    pos += 1;
                },
                _ => break,
            }
        }
        pos
    }

    /// Skips inline (non-newline) whitespace, honoring a trailing `\`
    /// line continuation. Returns `(more_on_this_logical_line, new_pos)`;
    /// `more_on_this_logical_line` is `false` once a bare (unescaped)
    /// newline is reached.
    fn skip_line_ws(&mut self, buffer: &[u8], mut pos: usize) -> (bool, usize) {
        loop {
            match buffer.get(pos) {
                Some(b' ') | Some(b'\t') | Some(0x0b) => {
                    pos += 1;
                },
                Some(b'\\') => {
                    let mut next = pos + 1;
                    if buffer.get(next) == Some(&b'\r') {
                        next += 1;
                    }
                    if buffer.get(next) == Some(&b'\n') {
                        next += 1;
                        self.line += 1;
                        pos = next;
                        continue;
                    }
                    // bare backslash not followed by a newline: treat the
                    // rest of the line as part of the token stream (an
                    // error in the reference source; here we just stop
                    // skipping so `get_token` can report it).
                    return (true, pos);
                },
                Some(b'\r') | Some(b'\n') | None => return (false, pos),
                _ => return (true, pos),
            }
        }
    }

    fn skip_to_eol(&mut self, buffer: &[u8], mut pos: usize) -> usize {
        while pos < buffer.len() && buffer[pos] != b'\n' && buffer[pos] != b'\r' {
            pos += 1;
        }
        pos
    }

    fn read_bare_token(&self, buffer: &[u8], mut pos: usize) -> (String, usize) {
        let start = pos;
        while pos < buffer.len() && !buffer[pos].is_ascii_whitespace() {
            pos += 1;
        }
        (String::from_utf8_lossy(&buffer[start..pos]).into_owned(), pos)
    }

    /// Reads one token starting at `pos`: either a quoted string (one of
    /// `'`, `"`, `` ` ``) with escape decoding, or a bare whitespace
    /// delimited word.
    fn get_token(&self, buffer: &[u8], pos: usize) -> Result<(String, usize)> {
        match buffer.get(pos) {
            Some(&q @ (b'\'' | b'"' | b'`')) => self.get_quoted_token(buffer, pos + 1, q),
            _ => Ok(self.read_bare_token(buffer, pos)),
        }
    }

    fn get_quoted_token(&self, buffer: &[u8], mut pos: usize, quote: u8) -> Result<(String, usize)> {
        let mut out = Vec::new();
        loop {
            match buffer.get(pos) {
                None => bail!("{}:{}: unterminated quoted string", self.what, self.line),
                Some(&c) if c == quote => {
                    pos += 1;
                    break;
                },
                Some(b'\\') => {
                    pos += 1;
                    match buffer.get(pos) {
                        Some(b'r') => {
                            out.push(b'\r');
                            pos += 1;
                        },
                        Some(b'n') => {
                            out.push(b'\n');
                            pos += 1;
                        },
                        Some(b't') => {
                            out.push(b'\t');
                            pos += 1;
                        },
                        Some(b'\\') => {
                            out.push(b'\\');
                            pos += 1;
                        },
                        Some(b'\'') => {
                            out.push(b'\'');
                            pos += 1;
                        },
                        Some(b'"') => {
                            out.push(b'"');
                            pos += 1;
                        },
                        Some(b'`') => {
                            out.push(b'`');
                            pos += 1;
                        },
                        Some(&h1) if h1.is_ascii_hexdigit() && buffer.get(pos + 1).is_some_and(u8::is_ascii_hexdigit) => {
                            let h2 = buffer[pos + 1];
                            let hi = (h1 as char).to_digit(16).unwrap();
                            let lo = (h2 as char).to_digit(16).unwrap();
                            out.push(((hi << 4) | lo) as u8);
                            pos += 2;
                        },
                        _ => bail!("{}:{}: malformed escape sequence", self.what, self.line),
                    }
                },
                Some(&c) => {
                    out.push(c);
                    pos += 1;
                },
            }
            if out.len() > PARSER_TOTAL_ARGS_SIZE {
                bail!("{}:{}: decoded token exceeds {} bytes", self.what, self.line, PARSER_TOTAL_ARGS_SIZE);
            }
        }
        Ok((String::from_utf8_lossy(&out).into_owned(), pos))
    }
}

// --- numeric token decoding --------------------------------------------

pub fn get_long(token: &str) -> Option<i64> {
    token.parse().ok()
}

pub fn get_ulong(token: &str) -> Option<(u64, Option<char>)> {
    let bytes = token.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    let last = *bytes.last().unwrap();
    if last.is_ascii_alphabetic() && bytes.len() > 1 {
        let numeric = &token[..token.len() - 1];
        numeric.parse::<u64>().ok().map(|v| (v, Some(last as char)))
    } else {
        token.parse::<u64>().ok().map(|v| (v, None))
    }
}

pub fn get_int(token: &str) -> Option<i32> {
    token.parse().ok()
}

pub fn get_uint(token: &str) -> Option<u32> {
    token.parse().ok()
}

pub fn get_float(token: &str) -> Option<f32> {
    token.parse().ok()
}

pub fn get_double(token: &str) -> Option<f64> {
    token.parse().ok()
}

/// Parses a byte size with an optional `{b,k,m,g,t}` suffix (powers of
/// 1024, case-insensitive).
pub fn get_size(token: &str) -> Option<u64> {
    if token.is_empty() {
        return None;
    }
    let lower = token.to_ascii_lowercase();
    let (numeric, multiplier) = match lower.chars().last().unwrap() {
        'b' => (&lower[..lower.len() - 1], 1u64),
        'k' => (&lower[..lower.len() - 1], 1024u64),
        'm' => (&lower[..lower.len() - 1], 1024u64 * 1024),
        'g' => (&lower[..lower.len() - 1], 1024u64 * 1024 * 1024),
        't' => (&lower[..lower.len() - 1], 1024u64 * 1024 * 1024 * 1024),
        _ => (lower.as_str(), 1u64),
    };
    numeric.parse::<u64>().ok().map(|v| v * multiplier)
}

/// Parses a duration with an optional `{s,m,h,d,w}` suffix, converting to
/// seconds.
pub fn get_duration(token: &str) -> Option<u64> {
    if token.is_empty() {
        return None;
    }
    let lower = token.to_ascii_lowercase();
    let (numeric, multiplier) = match lower.chars().last().unwrap() {
        's' => (&lower[..lower.len() - 1], 1u64),
        'm' => (&lower[..lower.len() - 1], 60u64),
        'h' => (&lower[..lower.len() - 1], 3600u64),
        'd' => (&lower[..lower.len() - 1], 86_400u64),
        'w' => (&lower[..lower.len() - 1], 604_800u64),
        _ => (lower.as_str(), 1u64),
    };
    numeric.parse::<u64>().ok().map(|v| v * multiplier)
}

/// Parses `{true,yes,on}`/`{false,no,off}`, case-insensitive.
pub fn get_boolean(token: &str) -> Option<bool> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_command(name: &'static str, sink: Arc<Mutex<Vec<(String, Vec<String>)>>>) -> Command {
        Command::new_set(
            name,
            Box::new(move |args: &[String]| {
                sink.lock().unwrap().push((name.to_string(), args.to_vec()));
                true
            }),
        )
    }

    #[test]
    fn config_file_parse_scenario() {
        // A comment line, a plain key, and a value continued across a
        // backslash line-continuation.
        let calls = Arc::new(Mutex::new(Vec::new()));
        let commands = vec![
            recording_command("port", calls.clone()),
            recording_command("listen", calls.clone()),
        ];
        let mut parser = Parser::new(commands);
        let input = b"# comment\nport 8120\nlisten 127.0.0.1 \\\n          ::1\n";
        parser
            .parse("test", input, false, &mut SilentCallbacks)
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ("port".to_string(), vec!["8120".to_string()]));
        assert_eq!(
            calls[1],
            (
                "listen".to_string(),
                vec!["127.0.0.1".to_string(), "::1".to_string()]
            )
        );
        assert_eq!(parser.line_number(), 4);
    }

    #[test]
    fn wildcard_enumeration_scenario() {
        // A wildcard mask should match ascending through the sorted table.
        let names = ["port", "persistent", "perf_a", "perf_b", "hash", "fpc_port"];
        let commands = names
            .iter()
            .map(|n| Command {
                name: n,
                set: None,
                get: None,
            })
            .collect();
        let parser = Parser::new(commands);
        let mut seen = Vec::new();
        let count = parser.enumerate("p*", |name| {
            seen.push(name.to_string());
            true
        });
        assert_eq!(count, 4);
        assert_eq!(seen, vec!["perf_a", "perf_b", "persistent", "port"]);
    }

    #[test]
    fn unknown_command_still_consumes_args_and_counts_lines() {
        let commands = vec![Command::new_set("port", Box::new(|_args: &[String]| true))];
        let mut parser = Parser::new(commands);
        let mut unknown = Vec::new();
        struct Callbacks<'a>(&'a mut Vec<String>);
        impl ParserCallbacks for Callbacks<'_> {
            fn on_unknown_set(&mut self, name: &str, _args: &[String]) {
                self.0.push(name.to_string());
            }
        }
        parser
            .parse("test", b"bogus a b\nport 80\n", false, &mut Callbacks(&mut unknown))
            .unwrap();
        assert_eq!(unknown, vec!["bogus"]);
        // "port 80" is on line 2; the trailing newline after it doesn't
        // start a line 3.
        assert_eq!(parser.line_number(), 2);
    }

    #[test]
    fn quoted_token_with_escapes() {
        let parser = Parser::new(vec![]);
        let (token, pos) = parser.get_token(br#""hi\tthere\x41""#, 0).unwrap();
        assert_eq!(token, "hi\tthereA");
        assert_eq!(pos, br#""hi\tthere\x41""#.len());
    }

    #[test]
    fn token_exactly_at_limit_succeeds_one_over_fails() {
        let parser = Parser::new(vec![]);
        let at_limit = format!("\"{}\"", "a".repeat(PARSER_TOTAL_ARGS_SIZE));
        assert!(parser.get_token(at_limit.as_bytes(), 0).is_ok());
        let over_limit = format!("\"{}\"", "a".repeat(PARSER_TOTAL_ARGS_SIZE + 1));
        assert!(parser.get_token(over_limit.as_bytes(), 0).is_err());
    }

    #[test]
    fn size_and_duration_suffixes() {
        assert_eq!(get_size("0"), Some(0));
        assert_eq!(get_size("1t"), Some(1u64 << 40));
        assert_eq!(get_size("4k"), Some(4096));
        assert_eq!(get_duration("2h"), Some(7200));
        assert_eq!(get_boolean("YES"), Some(true));
        assert_eq!(get_boolean("off"), Some(false));
    }

    #[test]
    fn plain_numeric_getters() {
        assert_eq!(get_long("-42"), Some(-42));
        assert_eq!(get_int("-7"), Some(-7));
        assert_eq!(get_uint("7"), Some(7));
        assert_eq!(get_float("1.5"), Some(1.5));
        assert_eq!(get_double("1.5"), Some(1.5));
        assert_eq!(get_long("not-a-number"), None);
    }

    #[test]
    fn ulong_getter_reports_trailing_suffix() {
        assert_eq!(get_ulong("128"), Some((128, None)));
        assert_eq!(get_ulong("128k"), Some((128, Some('k'))));
        assert_eq!(get_ulong(""), None);
    }

    #[test]
    fn query_runs_getter_and_reports_state() {
        let commands = vec![Command {
            name: "stats",
            set: None,
            get: Some(Box::new(|buf: &mut Vec<u8>| {
                buf.extend_from_slice(b"ok");
                2
            })),
        }];
        let mut parser = Parser::new(commands);
        assert!(!parser.is_interactive());

        let mut buf = Vec::new();
        let n = parser.query("stats", &mut buf, &mut SilentCallbacks);
        assert_eq!(n, 2);
        assert_eq!(buf, b"ok");

        parser
            .parse("admin-console", b"", true, &mut SilentCallbacks)
            .unwrap();
        assert!(parser.is_interactive());
        assert_eq!(parser.source_name(), "admin-console");
    }
}
