use std::borrow::Cow;

use crate::config::CompareMode;
use crate::model::{Classification, ExecutionResult, Verdict};

/// Judges one execution against the expected output
pub fn compare(result: &ExecutionResult, expected: &[u8], mode: CompareMode) -> Verdict {
    match result.classification {
        Classification::TimedOut => Verdict::Timeout,
        Classification::Crashed { .. } => Verdict::RuntimeError,
        Classification::Completed => {
            if normalize(&result.stdout, mode) == normalize(expected, mode) {
                Verdict::Pass
            } else {
                Verdict::WrongAnswer
            }
        }
    }
}

/// Canonical form of an output payload
///
/// Both modes unify `\r\n` to `\n` and trim ASCII whitespace around the payload
/// as a whole. `Lines` additionally drops trailing whitespace on every line,
/// which also removes trailing empty lines. All other bytes are compared exactly.
fn normalize(payload: &[u8], mode: CompareMode) -> Cow<'_, [u8]> {
    let unified = if payload.contains(&b'\r') {
        Cow::Owned(unify_line_endings(payload))
    } else {
        Cow::Borrowed(payload)
    };

    match mode {
        CompareMode::Boundary => match unified {
            Cow::Borrowed(s) => Cow::Borrowed(s.trim_ascii()),
            Cow::Owned(s) => Cow::Owned(s.trim_ascii().to_vec()),
        },
        CompareMode::Lines => {
            let joined = unified
                .split(|&b| b == b'\n')
                .map(|line| line.trim_ascii_end())
                .collect::<Vec<_>>()
                .join(&b'\n');
            Cow::Owned(joined.trim_ascii().to_vec())
        }
    }
}

fn unify_line_endings(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    let mut bytes = payload.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        if b == b'\r' && bytes.peek() == Some(&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}
