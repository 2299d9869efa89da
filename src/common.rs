use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub const TEXT_MARKER: char = '$';

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueType {
    Numeric,
    Text,
}

impl ValueType {
    pub fn of_name(name: &str) -> Self {
        if name.ends_with(TEXT_MARKER) {
            ValueType::Text
        } else {
            ValueType::Numeric
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueType::Numeric => write!(f, "<int>"),
            ValueType::Text => write!(f, "<string>"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Semantic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Lexical => write!(f, "lexical"),
            ErrorKind::Syntax => write!(f, "syntax"),
            ErrorKind::Semantic => write!(f, "semantic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub line: u32,
    pub column: usize,
    pub length: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    source_name: String,
    source: Option<String>,
    entries: Vec<Diagnostic>,
    quiet: bool,
}

impl Diagnostics {
    pub fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            source: None,
            entries: Vec::new(),
            quiet: false,
        }
    }

    pub fn quiet(source_name: &str) -> Self {
        Self {
            quiet: true,
            ..Self::new(source_name)
        }
    }

    // later reports echo the offending line with the span underlined
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn report(&mut self, kind: ErrorKind, line: u32, column: usize, message: &str) -> () {
        self.report_span(kind, line, column, 1, message)
    }

    pub fn report_span(&mut self, kind: ErrorKind, line: u32, column: usize, length: usize, message: &str) -> () {
        let diagnostic = Diagnostic {
            kind,
            line,
            column,
            length,
            message: message.to_string(),
        };
        if !self.quiet {
            eprintln!("{}", self.render(&diagnostic));
        }
        tracing::debug!(%kind, line, column, length, "{}", message);
        self.entries.push(diagnostic);
    }

    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut out = String::new();
        if !self.source_name.is_empty() {
            out.push_str(&self.source_name);
            out.push(':');
        }
        out.push_str(&format!(
            "{}:{}: {} error: {}",
            diagnostic.line, diagnostic.column, diagnostic.kind, diagnostic.message
        ));
        if let Some(text) = self.source_line(diagnostic.line) {
            out.push('\n');
            out.push_str(text);
            out.push('\n');
            // tabs are kept so the carets line up under the token
            for c in text.chars().take(diagnostic.column.saturating_sub(1)) {
                out.push(if c == '\t' { '\t' } else { ' ' });
            }
            out.push_str(&"^".repeat(diagnostic.length.max(1)));
        }
        out
    }

    fn source_line(&self, line: u32) -> Option<&str> {
        let index = (line as usize).checked_sub(1)?;
        self.source
            .as_ref()?
            .lines()
            .nth(index)
            .map(|text| text.trim_end_matches('\r'))
    }

    pub fn error_count(&self) -> usize {
        self.entries.len()
    }

    pub fn count_of(&self, kind: ErrorKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("No file called {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Couldn't create output file {}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{count} errors while parsing {}. Code generation not attempted", path.display())]
    Parse { path: PathBuf, count: usize },
    #[error("{count} errors during code generation of {}", path.display())]
    Generate { path: PathBuf, count: usize },
    #[error("assembler `{command}` could not be started")]
    AssemblerSpawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("assembler `{command}` failed on {}", path.display())]
    AssemblerFailed { command: String, path: PathBuf },
    #[error(transparent)]
    Runtime(#[from] crate::vm::RuntimeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_marker_selects_text() {
        assert_eq!(ValueType::of_name("name$"), ValueType::Text);
        assert_eq!(ValueType::of_name("count"), ValueType::Numeric);
        assert_eq!(ValueType::of_name("a$b"), ValueType::Numeric);
    }

    #[test]
    fn diagnostics_count_every_report() {
        let mut diagnostics = Diagnostics::quiet("prog.small");
        diagnostics.report(ErrorKind::Semantic, 3, 5, "first");
        diagnostics.report(ErrorKind::Syntax, 4, 1, "second");
        assert_eq!(diagnostics.error_count(), 2);
        assert_eq!(diagnostics.count_of(ErrorKind::Semantic), 1);
        assert_eq!(
            diagnostics.render(&diagnostics.entries()[0]),
            "prog.small:3:5: semantic error: first"
        );
    }

    #[test]
    fn rendering_underlines_the_span() {
        let mut diagnostics = Diagnostics::quiet("prog.small").with_source("x = 1\nif x print 1 end\n");
        diagnostics.report_span(ErrorKind::Syntax, 2, 6, 5, "Found 'print' when expecting 'then'");
        assert_eq!(
            diagnostics.render(&diagnostics.entries()[0]),
            "prog.small:2:6: syntax error: Found 'print' when expecting 'then'\n\
             if x print 1 end\n\
             \x20    ^^^^^"
        );
        assert_eq!(diagnostics.entries()[0].length, 5);
    }

    #[test]
    fn empty_span_still_gets_a_caret() {
        let mut diagnostics = Diagnostics::quiet("").with_source("\tx = (1");
        diagnostics.report_span(ErrorKind::Syntax, 1, 8, 0, "Found end of file when expecting ')'");
        let text = diagnostics.render(&diagnostics.entries()[0]);
        assert!(text.ends_with("\n\tx = (1\n\t      ^"), "{:?}", text);
    }

    #[test]
    fn lines_past_the_source_are_not_echoed() {
        let mut diagnostics = Diagnostics::quiet("p").with_source("x = 1");
        diagnostics.report(ErrorKind::Semantic, 9, 1, "late");
        assert_eq!(diagnostics.render(&diagnostics.entries()[0]), "p:9:1: semantic error: late");
    }
}
