use std::fmt;

/// How a status line should be presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    fn marker(self) -> &'static str {
        match self {
            Self::Info => "ℹ️ ",
            Self::Success => "✅",
            Self::Warning => "⚠️ ",
            Self::Error => "❌",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

pub fn format_status(severity: Severity, message: &str) -> String {
    format!("{severity} {message}")
}

/// Prints a status line; warnings and errors go to stderr.
pub fn report(severity: Severity, message: &str) {
    let line = format_status(severity, message);
    match severity {
        Severity::Info | Severity::Success => println!("{line}"),
        Severity::Warning | Severity::Error => eprintln!("{line}"),
    }
}

pub fn info(message: &str) {
    report(Severity::Info, message);
}

pub fn success(message: &str) {
    report(Severity::Success, message);
}

pub fn warning(message: &str) {
    report(Severity::Warning, message);
}

pub fn error(message: &str) {
    report(Severity::Error, message);
}
