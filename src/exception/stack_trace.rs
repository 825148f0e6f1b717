//! Best-effort stack trace parsing.
//!
//! Reconstructs structured frames from a V8-style textual trace:
//!
//! ```text
//! TypeError: boom
//!     at Foo.bar (/srv/app/foo.js:10:5)
//!     at /srv/app/index.js:3:1
//!     at Array.forEach (native)
//! ```
//!
//! # Design Decisions
//! - The first line is the error summary and never yields a frame
//! - Lines that do not look like a frame are skipped, never reported
//! - Numbers that are missing, unparseable or zero are left unset
//! - Output preserves input order, separators included

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Async/sync segment delimiter emitted by some runtimes (`    ----`).
static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-{4,}$").expect("separator pattern is valid"));

/// `at [qualified-name (](file:line[:col] | bare-location)[)]`
static FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"at (?:(.+?)\s+\()?(?:(.+?):(\d+)(?::(\d+))?|([^)]+))\)?")
        .expect("frame pattern is valid")
});

const ANONYMOUS: &str = "<anonymous>";
const NATIVE: &str = "native";
const MODULE_MARKER: &str = ".Module";

/// One frame of a parsed stack trace. Every field is optional because the
/// source line may only partially match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTrace {
    pub file_name: Option<String>,
    pub line_number: Option<u32>,
    pub function_name: Option<String>,
    pub type_name: Option<String>,
    pub method_name: Option<String>,
    pub column_number: Option<u32>,
    pub native: Option<bool>,
}

impl StackTrace {
    fn separator(line: &str) -> Self {
        Self {
            file_name: Some(line.to_string()),
            ..Self::default()
        }
    }
}

/// Parse a raw trace into frames, dropping the leading summary line.
pub fn parse_stack_trace(stack: &str) -> Vec<StackTrace> {
    stack.lines().skip(1).filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<StackTrace> {
    if SEPARATOR.is_match(line) {
        return Some(StackTrace::separator(line));
    }

    let caps = FRAME.captures(line)?;

    let native = caps.get(5).is_some_and(|m| m.as_str() == NATIVE);
    let mut function_name = caps.get(1).map(|m| m.as_str().to_string());
    let mut type_name = None;
    let mut method_name = None;

    if let Some(qualified) = caps.get(1).and_then(|m| split_qualified(m.as_str())) {
        function_name = Some(qualified.function.to_string());

        if !qualified.method.is_empty() {
            type_name = Some(qualified.object.to_string());
            method_name = Some(qualified.method.to_string());
        }

        if qualified.method == ANONYMOUS {
            method_name = None;
            function_name = None;
        }
    }

    Some(StackTrace {
        file_name: caps.get(2).map(|m| m.as_str().to_string()),
        line_number: caps.get(3).and_then(|m| parse_position(m.as_str())),
        function_name,
        type_name,
        method_name,
        column_number: caps.get(4).and_then(|m| parse_position(m.as_str())),
        native: Some(native),
    })
}

struct QualifiedName<'a> {
    object: &'a str,
    method: &'a str,
    function: &'a str,
}

/// Split `Type.method` on its last dot. A doubled dot (`Type..js`) moves the
/// split point onto the first dot of the pair.
fn split_qualified(name: &str) -> Option<QualifiedName<'_>> {
    let mut start = name.rfind('.')?;
    if start > 0 && name.as_bytes()[start - 1] == b'.' {
        start -= 1;
    }
    if start == 0 {
        return None;
    }

    let mut object = &name[..start];
    let method = &name[start + 1..];
    let mut function = name;

    // `Object.Module._compile` -> type `Object`, function `Module._compile`
    if let Some(end) = object.find(MODULE_MARKER).filter(|&i| i > 0) {
        function = &name[end + 1..];
        object = &object[..end];
    }

    Some(QualifiedName {
        object,
        method,
        function,
    })
}

fn parse_position(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().filter(|n| *n != 0)
}
