//! Event scripts for `breakers simulate`.
//!
//! A script is a comma- or whitespace-separated list of events:
//!
//! ```text
//! ok          successful call
//! err         failed call
//! wait:N      advance the clock by N seconds
//! reset       force the breaker closed
//! ok*60       any event can be repeated with `*N`
//! ```

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fmt;

/// Upper bound on the number of events a script may expand to.
pub const MAX_EVENTS: usize = 100_000;

/// One scripted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "secs", rename_all = "snake_case")]
pub enum Event {
    Ok,
    Err,
    Wait(i64),
    Reset,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Ok => f.write_str("ok"),
            Event::Err => f.write_str("err"),
            Event::Wait(secs) => write!(f, "wait:{}", secs),
            Event::Reset => f.write_str("reset"),
        }
    }
}

/// Parse a script into a flat list of events, expanding repetitions.
pub fn parse(script: &str) -> Result<Vec<Event>> {
    let mut events = Vec::new();

    for token in script
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let (name, repeat) = match token.split_once('*') {
            Some((name, count)) => {
                let count: usize = count
                    .parse()
                    .with_context(|| format!("invalid repeat count in `{}`", token))?;
                (name, count)
            }
            None => (token, 1),
        };

        let event = parse_event(name)?;
        if repeat > MAX_EVENTS - events.len() {
            bail!("event script expands to more than {} events", MAX_EVENTS);
        }
        events.extend(std::iter::repeat(event).take(repeat));
    }

    if events.is_empty() {
        bail!("event script is empty");
    }

    Ok(events)
}

fn parse_event(name: &str) -> Result<Event> {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "ok" | "success" => return Ok(Event::Ok),
        "err" | "error" | "fail" => return Ok(Event::Err),
        "reset" => return Ok(Event::Reset),
        _ => {}
    }

    if let Some(secs) = lower.strip_prefix("wait:") {
        let secs: i64 = secs
            .parse()
            .with_context(|| format!("invalid wait duration in `{}`", name))?;
        if secs < 0 {
            bail!("wait duration must not be negative: `{}`", name);
        }
        return Ok(Event::Wait(secs));
    }

    bail!("unknown event `{}` (expected ok, err, wait:N or reset)", name)
}
