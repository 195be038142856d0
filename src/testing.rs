//! Process runner double for exercising orchestration without devices.

use crate::process::{CommandSpec, ProcessOutcome, ProcessRunner};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

struct Rule {
    program: Option<String>,
    needles: Vec<String>,
    outcome: ProcessOutcome,
    output: Option<Vec<u8>>,
}

impl Rule {
    fn matches(&self, command: &CommandSpec) -> bool {
        self.program.as_ref().map_or(true, |p| *p == command.program)
            && self
                .needles
                .iter()
                .all(|needle| command.args.iter().any(|arg| arg == needle))
    }
}

/// Answers commands from a script; unmatched commands succeed silently.
///
/// Rules are checked in registration order and the first match wins.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_program(&self, program: &str, outcome: ProcessOutcome) {
        self.rules.lock().push(Rule {
            program: Some(program.to_string()),
            needles: Vec::new(),
            outcome,
            output: None,
        });
    }

    /// Match commands carrying every one of `needles` as an argument
    pub fn on_args(&self, needles: &[&str], outcome: ProcessOutcome) {
        self.rules.lock().push(Rule {
            program: None,
            needles: needles.iter().map(|n| n.to_string()).collect(),
            outcome,
            output: None,
        });
    }

    /// Capture from `device_path` writes `bytes` to the `--stream-to` target
    pub fn on_capture(&self, device_path: &str, bytes: Vec<u8>, outcome: ProcessOutcome) {
        self.rules.lock().push(Rule {
            program: None,
            needles: vec![
                "-d".to_string(),
                device_path.to_string(),
                "--stream-count=1".to_string(),
            ],
            outcome,
            output: Some(bytes),
        });
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    /// Recorded calls rendered as command lines
    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }
}

pub fn succeeded() -> ProcessOutcome {
    ProcessOutcome::Completed {
        code: Some(0),
        stdout: String::new(),
        stderr: String::new(),
    }
}

pub fn exited(code: i32, stderr: &str) -> ProcessOutcome {
    ProcessOutcome::Completed {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec, _timeout: Duration) -> ProcessOutcome {
        self.calls.lock().push(command.clone());

        let (outcome, output) = {
            let rules = self.rules.lock();
            match rules.iter().find(|rule| rule.matches(command)) {
                Some(rule) => (rule.outcome.clone(), rule.output.clone()),
                None => (succeeded(), None),
            }
        };

        if let Some(bytes) = output {
            let target = command
                .args
                .iter()
                .find_map(|arg| arg.strip_prefix("--stream-to="));
            if let Some(target) = target {
                // Write errors surface as a missing file in the caller
                let _ = std::fs::write(target, bytes);
            }
        }

        outcome
    }
}

/// Smallest byte stream the JPEG segment walker accepts as an image
pub fn jpeg_bytes(scan_len: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    // APP0 JFIF
    data.extend_from_slice(&[
        0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00,
        0x01, 0x00, 0x00,
    ]);
    // DQT with one zeroed table
    data.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x43, 0x00]);
    data.extend(std::iter::repeat(1u8).take(64));
    // SOS header then entropy-coded filler
    data.extend_from_slice(&[
        0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00,
    ]);
    data.extend((0..scan_len).map(|i| (i % 0xFE) as u8));
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}
