//! Web access-log rendering of [`Event`]s.
//!
//! ```text
//! [2013-10-28T00:40:06.122Z] /static/image-4?user=0006c913 220.74.147.103
//! ```
//!
//! The timestamp is RFC 3339 with millisecond precision, the user id is eight
//! lowercase hex digits in the `user` query parameter, and the address is a
//! dotted quad.

use crate::error::EventError;
use crate::event::{is_valid_operation, Event};
use chrono::{DateTime, SecondsFormat};
use std::net::Ipv4Addr;

/// Render `event` as an access-log line. `None` if the timestamp is outside
/// the range representable as a calendar date.
pub fn format(event: &Event) -> Option<String> {
    let stamp = DateTime::from_timestamp_millis(event.timestamp_millis())?
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    Some(format!(
        "[{stamp}] /{}?user={:08x} {}",
        event.operation(),
        event.user_id(),
        event.address()
    ))
}

/// Parse one access-log line.
pub fn parse(line: &str) -> Result<Event, EventError> {
    let bad = |reason: &str| EventError::format(line, reason);

    let rest = line
        .strip_prefix('[')
        .ok_or_else(|| bad("missing timestamp"))?;
    let (stamp, rest) = rest
        .split_once("] /")
        .ok_or_else(|| bad("missing request path"))?;
    let (request, address) = rest
        .rsplit_once(' ')
        .ok_or_else(|| bad("missing address"))?;

    let time = DateTime::parse_from_rfc3339(stamp).map_err(|_| bad("invalid timestamp"))?;

    let param = request.rfind("user=").ok_or_else(|| bad("missing user"))?;
    let (operation, user) = match request.as_bytes().get(param.wrapping_sub(1)) {
        Some(b'?') | Some(b'&') => (&request[..param - 1], &request[param + "user=".len()..]),
        _ => return Err(bad("missing user")),
    };
    if !is_valid_operation(operation) {
        return Err(bad("empty or malformed operation"));
    }
    if user.is_empty() || !user.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(bad("user id is not hexadecimal"));
    }
    let user_id = u32::from_str_radix(user, 16).map_err(|_| bad("user id out of range"))?;

    let address: Ipv4Addr = address.parse().map_err(|_| bad("invalid address"))?;

    Event::new(
        user_id,
        time.timestamp_millis(),
        operation,
        Event::encode_address(address),
    )
    .map_err(|_| bad("empty or malformed operation"))
}
