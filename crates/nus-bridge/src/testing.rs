//! Test doubles for the shell and the notify sink.

use std::collections::VecDeque;

use crate::notify::NotifySink;
use crate::shell::{Shell, ShellInput};

#[derive(Debug)]
pub struct MockShell {
    pub output: VecDeque<Vec<u8>>,
    pub written: Vec<Vec<u8>>,
    pub write_calls: usize,
    pub accept_limit: Option<usize>,
    pub alive: bool,
    pub terminate_calls: usize,
}

impl MockShell {
    pub fn new() -> Self {
        Self {
            output: VecDeque::new(),
            written: Vec::new(),
            write_calls: 0,
            accept_limit: None,
            alive: true,
            terminate_calls: 0,
        }
    }

    pub fn with_output(chunks: &[&[u8]]) -> Self {
        let mut shell = Self::new();
        shell.output = chunks.iter().map(|c| c.to_vec()).collect();
        shell
    }
}

impl ShellInput for MockShell {
    fn write(&mut self, data: &[u8]) -> usize {
        self.write_calls += 1;
        let n = self.accept_limit.map_or(data.len(), |limit| limit.min(data.len()));
        self.written.push(data[..n].to_vec());
        n
    }
}

impl Shell for MockShell {
    fn read(&mut self) -> Vec<u8> {
        self.output.pop_front().unwrap_or_default()
    }

    fn is_alive(&mut self) -> bool {
        self.alive
    }

    fn exit_code(&mut self) -> Option<u32> {
        (!self.alive).then_some(0)
    }

    fn terminate(&mut self) {
        self.terminate_calls += 1;
        self.alive = false;
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub notified: Vec<Vec<u8>>,
    pub reads: Vec<Vec<u8>>,
}

impl NotifySink for RecordingSink {
    fn notify(&mut self, frame: &[u8]) {
        self.notified.push(frame.to_vec());
    }

    fn read_response(&mut self, value: &[u8]) {
        self.reads.push(value.to_vec());
    }
}
