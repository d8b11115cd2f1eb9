use std::fmt;

use kiln_lang_printer::tokens::*;
use kiln_lang_printer::{PrintCfg, PrintToStringInCtx};
use kiln_lang_term::Names;

use crate::Equation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    Failed,
    Stalled,
}

/// Why an equation did not get solved: the equation as it was posed, and the
/// derived equations responsible.
#[derive(Debug, Clone)]
pub struct EquationReport {
    pub equation: Equation,
    pub status: ReportStatus,
    pub causes: Vec<EquationReport>,
}

impl EquationReport {
    pub fn is_stalled(&self) -> bool {
        self.status == ReportStatus::Stalled
    }

    /// The innermost equations responsible for the outcome.
    pub fn leaves(&self) -> Vec<&EquationReport> {
        if self.causes.is_empty() {
            vec![self]
        } else {
            self.causes.iter().flat_map(EquationReport::leaves).collect()
        }
    }

    /// Renders the report as text, releasing every term.
    pub fn render(&self, names: &Names) -> EquationTrace {
        let cfg = PrintCfg { width: 10_000, ..Default::default() };
        let mut lines = Vec::new();
        self.render_into(names, &cfg, 0, &mut lines);
        for (lhs, rhs) in self.equation.stack.assumptions().into_iter().rev() {
            lines.push(format!(
                "{ASSUMING} {} {TILDE} {}",
                lhs.print_to_string_in_ctx(Some(&cfg), names),
                rhs.print_to_string_in_ctx(Some(&cfg), names),
            ));
        }
        EquationTrace { lines, stalled: self.is_stalled() }
    }

    fn render_into(&self, names: &Names, cfg: &PrintCfg, depth: usize, lines: &mut Vec<String>) {
        let keyword = match self.status {
            ReportStatus::Failed => FAILED,
            ReportStatus::Stalled => STALLED,
        };
        lines.push(format!(
            "{:indent$}{keyword} {}",
            "",
            self.equation.print_to_string_in_ctx(Some(cfg), names),
            indent = depth * 2
        ));
        for cause in &self.causes {
            cause.render_into(names, cfg, depth + 1, lines);
        }
    }
}

/// A rendered [EquationReport].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquationTrace {
    pub lines: Vec<String>,
    pub stalled: bool,
}

impl fmt::Display for EquationTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.join("\n"))
    }
}
