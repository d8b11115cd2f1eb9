use log::trace;

use crate::{HashMap, HashSet, SymbolId, Term};

/// One instruction of a match program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternStep {
    /// Capture the next argument of the matched term.
    PullArgument,
    /// Reduce `substitution` (instantiated with the captures so far), require it to
    /// be `expected_head` applied to exactly `args_captured` arguments, and capture
    /// those arguments.
    Match { substitution: Term, expected_head: Term, args_captured: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternBody {
    /// Number of arguments of the head consumed by the pattern.
    pub args_captured: usize,
    pub steps: Vec<PatternStep>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub head: Term,
    pub body: PatternBody,
}

impl Pattern {
    /// The pattern `head $0 ... $(args - 1)` capturing every argument.
    pub fn lambda(head: Term, args: usize) -> Self {
        Pattern {
            head,
            body: PatternBody { args_captured: args, steps: vec![PatternStep::PullArgument; args] },
        }
    }

    pub fn capture_count(&self) -> usize {
        self.body
            .steps
            .iter()
            .map(|step| match step {
                PatternStep::PullArgument => 1,
                PatternStep::Match { args_captured, .. } => *args_captured,
            })
            .sum()
    }
}

/// A rewrite rule: a term matching `pattern` rewrites to `replacement`, whose
/// arguments refer to the captures in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pattern: Pattern,
    pub replacement: Term,
}

impl Rule {
    pub fn head(&self) -> SymbolId {
        match self.pattern.head.as_declaration() {
            Some(id) => id,
            None => panic!("rule head {:?} is not a declaration", self.pattern.head),
        }
    }

    /// All terms the rule mentions.
    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.pattern
            .body
            .steps
            .iter()
            .flat_map(|step| match step {
                PatternStep::PullArgument => None,
                PatternStep::Match { substitution, .. } => Some(substitution),
            })
            .chain(std::iter::once(&self.replacement))
    }
}

/// The global rule table, keyed by head declaration.
#[derive(Debug, Default)]
pub struct RuleCollector {
    declarations: HashMap<SymbolId, Option<Rule>>,
    generation: u64,
}

impl RuleCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_declaration(&mut self, declaration: &Term) {
        let Some(id) = declaration.as_declaration() else {
            panic!("cannot register {declaration:?} as a declaration");
        };
        self.declarations.entry(id).or_insert(None);
    }

    /// Installs `rule` for its head.
    ///
    /// A declaration owns at most one rule. Installing a second one, or a rule for
    /// an unregistered head, is a kernel bug and panics.
    pub fn add_rule(&mut self, rule: Rule) {
        let head = rule.head();
        match self.declarations.get_mut(&head) {
            None => panic!("rule for unregistered declaration d{head}"),
            Some(Some(_)) => panic!("declaration d{head} already owns a rule"),
            Some(slot) => {
                let captures = rule.pattern.capture_count();
                trace!("installing rule for d{head} with {captures} captures");
                *slot = Some(rule);
                self.generation += 1;
            }
        }
    }

    pub fn rule_for(&self, id: SymbolId) -> Option<&Rule> {
        self.declarations.get(&id).and_then(Option::as_ref)
    }

    pub fn has_rule(&self, id: SymbolId) -> bool {
        self.rule_for(id).is_some()
    }

    /// Increases whenever a rule is installed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `term` mentions `target`, directly or through installed rules.
    pub fn term_depends_on(&self, term: &Term, target: SymbolId) -> bool {
        let mut visited = HashSet::default();
        let mut pending = Vec::new();
        term.visit_declarations(&mut |id| pending.push(id));
        while let Some(id) = pending.pop() {
            if id == target {
                return true;
            }
            if !visited.insert(id) {
                continue;
            }
            if let Some(rule) = self.rule_for(id) {
                for term in rule.terms() {
                    term.visit_declarations(&mut |id| pending.push(id));
                }
            }
        }
        false
    }
}
