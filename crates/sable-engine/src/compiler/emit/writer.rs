//! Output buffer that knows its generated position

use crate::compiler::sourcemap::GeneratedPos;

/// Text buffer tracking the 0-based line and UTF-16 column of the next write
#[derive(Debug)]
pub struct SourceWriter {
    output: String,
    line: u32,
    column: u32,
    indent_level: usize,
    indent_width: usize,
    at_line_start: bool,
}

impl SourceWriter {
    pub fn new(indent_width: usize) -> Self {
        Self {
            output: String::new(),
            line: 0,
            column: 0,
            indent_level: 0,
            indent_width,
            at_line_start: true,
        }
    }

    /// Position at which the next non-whitespace text will land
    pub fn position(&self) -> GeneratedPos {
        let column = if self.at_line_start {
            (self.indent_level * self.indent_width) as u32
        } else {
            self.column
        };
        GeneratedPos::new(self.line, column)
    }

    /// Write text that contains no line breaks
    pub fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.at_line_start {
            let pad = self.indent_level * self.indent_width;
            self.output.extend(std::iter::repeat(' ').take(pad));
            self.column = pad as u32;
            self.at_line_start = false;
        }
        self.output.push_str(text);
        self.column += text.encode_utf16().count() as u32;
    }

    pub fn newline(&mut self) {
        self.output.push('\n');
        self.line += 1;
        self.column = 0;
        self.at_line_start = true;
    }

    pub fn write_line(&mut self, text: &str) {
        self.write(text);
        self.newline();
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    pub fn get_output(&self) -> &str {
        &self.output
    }

    pub fn take_output(self) -> String {
        self.output
    }
}
