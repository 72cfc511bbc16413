use crate::error::{ConfigError, EventError};
use std::cmp::Ordering;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Separator between the fields of a compact event line.
pub const FIELD_SEPARATOR: char = ' ';

const FIELD_COUNT: usize = 4;

/// One user action: who did what, when, and from where.
///
/// Compact line form: `<user_id> <timestamp_millis> <operation> <ip_address>`,
/// e.g. `444691 1382920806122 static/image-4 -599092377`. The address is the
/// big-endian IPv4 address reinterpreted as a signed 32-bit integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    user_id: u32,
    timestamp_millis: i64,
    operation: String,
    ip_address: i32,
}

impl Event {
    /// Build an event. The operation must be a non-empty token without
    /// whitespace so that the compact line form stays parseable.
    pub fn new(
        user_id: u32,
        timestamp_millis: i64,
        operation: impl Into<String>,
        ip_address: i32,
    ) -> Result<Self, ConfigError> {
        let operation = operation.into();
        if !is_valid_operation(&operation) {
            return Err(ConfigError::InvalidOperation(operation));
        }
        Ok(Self {
            user_id,
            timestamp_millis,
            operation,
            ip_address,
        })
    }

    /// For callers that have already validated `operation`.
    pub(crate) fn from_parts(
        user_id: u32,
        timestamp_millis: i64,
        operation: String,
        ip_address: i32,
    ) -> Self {
        debug_assert!(is_valid_operation(&operation));
        Self {
            user_id,
            timestamp_millis,
            operation,
            ip_address,
        }
    }

    pub fn user_id(&self) -> u32 {
        self.user_id
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn ip_address(&self) -> i32 {
        self.ip_address
    }

    /// The address as a dotted-quad value.
    pub fn address(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.ip_address as u32)
    }

    /// Signed wire encoding of an IPv4 address.
    pub fn encode_address(addr: Ipv4Addr) -> i32 {
        u32::from(addr) as i32
    }

    /// Read exactly one line from `input` and decode it.
    ///
    /// Returns `Ok(None)` when the input is already exhausted. A malformed
    /// line, including one that is not valid UTF-8, is consumed and reported
    /// as [`EventError::Format`]; the next call continues with the following
    /// line.
    pub fn read<R: BufRead + ?Sized>(input: &mut R) -> Result<Option<Event>, EventError> {
        let mut line = Vec::new();
        if input.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        decode_line(&line).map(Some)
    }

    /// The compact line form, without a line terminator.
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// Write the compact line form followed by `\n`.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{self}")
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}{sep}{}",
            self.user_id,
            self.timestamp_millis,
            self.operation,
            self.ip_address,
            sep = FIELD_SEPARATOR
        )
    }
}

impl FromStr for Event {
    type Err = EventError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() != FIELD_COUNT {
            return Err(EventError::format(
                line,
                format!("expected {FIELD_COUNT} fields, found {}", fields.len()),
            ));
        }

        let user_id = parse_decimal(line, "user id", fields[0])?;
        let timestamp_millis = parse_decimal(line, "timestamp", fields[1])?;
        let operation = fields[2];
        if !is_valid_operation(operation) {
            return Err(EventError::format(line, "empty or malformed operation"));
        }
        let ip_address = parse_decimal(line, "ip address", fields[3])?;

        Ok(Event {
            user_id,
            timestamp_millis,
            operation: operation.to_string(),
            ip_address,
        })
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.user_id
            .cmp(&other.user_id)
            .then(self.timestamp_millis.cmp(&other.timestamp_millis))
            .then(self.ip_address.cmp(&other.ip_address))
            .then_with(|| self.operation.cmp(&other.operation))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lazily decodes events from a line-oriented reader.
///
/// Malformed lines are yielded as errors and iteration continues with the next
/// line, so callers can choose to skip them. An I/O failure is yielded once and
/// ends the iteration.
pub struct EventReader<R> {
    input: R,
    buf: Vec<u8>,
    line_number: u64,
    failed: bool,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            buf: Vec::new(),
            line_number: 0,
            failed: false,
        }
    }

    /// 1-based number of the line most recently read.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    pub fn into_inner(self) -> R {
        self.input
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<Event, EventError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.buf.clear();
        match self.input.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line_number += 1;
                Some(decode_line(&self.buf))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e.into()))
            }
        }
    }
}

pub(crate) fn is_valid_operation(token: &str) -> bool {
    !token.is_empty() && !token.chars().any(char::is_whitespace)
}

/// Decode one raw line, terminator included. Bytes that are not UTF-8 are
/// content, not a stream fault.
fn decode_line(raw: &[u8]) -> Result<Event, EventError> {
    match std::str::from_utf8(raw) {
        Ok(line) => strip_line_ending(line).parse(),
        Err(e) => {
            let lossy = String::from_utf8_lossy(raw);
            Err(EventError::format(
                strip_line_ending(&lossy),
                format!("not valid UTF-8 after byte {}", e.valid_up_to()),
            ))
        }
    }
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Strict base-10 parse: optional leading `-`, digits only.
fn parse_decimal<T: FromStr>(line: &str, field: &str, text: &str) -> Result<T, EventError> {
    if text.starts_with('+') {
        return Err(EventError::format(line, format!("{field} has a sign prefix")));
    }
    text.parse()
        .map_err(|_| EventError::format(line, format!("{field} {text:?} is not a valid number")))
}
