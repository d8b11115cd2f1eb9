use crate::{Arena, HashMap, PatternStep, Rule, RuleCollector, Term, TermKind};

/// Lets a local equality context substitute terms during reduction.
pub trait ReductionHook {
    /// A replacement for `term`, which is already in normal form with respect to
    /// the rule table.
    fn rewrite(&self, term: &Term) -> Option<Term>;
}

/// Reduction with the global rules only.
pub struct NoHook;

impl ReductionHook for NoHook {
    fn rewrite(&self, _term: &Term) -> Option<Term> {
        None
    }
}

/// Computes normal forms with respect to a rule table.
///
/// Results are memoized for the lifetime of the reducer, which must therefore not
/// outlive a change of the rule table or of the hook.
pub struct Reducer<'a, H: ReductionHook> {
    arena: &'a Arena,
    rules: &'a RuleCollector,
    hook: &'a H,
    memo: HashMap<Term, Term>,
}

impl<'a, H: ReductionHook> Reducer<'a, H> {
    pub fn new(arena: &'a Arena, rules: &'a RuleCollector, hook: &'a H) -> Self {
        Reducer { arena, rules, hook, memo: HashMap::default() }
    }

    pub fn normalize(&mut self, term: Term) -> Term {
        if let Some(done) = self.memo.get(&term) {
            return done.clone();
        }
        let result = self.normalize_uncached(term.clone(), true);
        self.memo.insert(term, result.clone());
        result
    }

    /// Normalizes the head and the arguments, but does not offer the resulting
    /// term itself to the hook.
    pub fn normalize_spine(&mut self, term: Term) -> Term {
        self.normalize_uncached(term, false)
    }

    fn normalize_uncached(&mut self, mut term: Term, rewrite_top: bool) -> Term {
        loop {
            term = self.whnf(term);
            let unfolded = term.unfold();
            if !unfolded.args.is_empty() {
                if let Some(head) = self.hook.rewrite(&unfolded.head) {
                    if head != unfolded.head {
                        term = self.arena.apply_all(head, unfolded.args);
                        continue;
                    }
                }
            }
            let args: Vec<Term> =
                unfolded.args.into_iter().map(|arg| self.normalize(arg)).collect();
            let rebuilt = self.arena.apply_all(unfolded.head, args);
            if rewrite_top {
                if let Some(rewritten) = self.hook.rewrite(&rebuilt) {
                    if rewritten != rebuilt {
                        term = rewritten;
                        continue;
                    }
                }
            }
            return rebuilt;
        }
    }

    /// Rewrites the head of `term` until no rule applies.
    pub fn whnf(&mut self, mut term: Term) -> Term {
        let rules = self.rules;
        loop {
            let unfolded = term.unfold();
            let Some(id) = unfolded.head.as_declaration() else {
                return term;
            };
            let Some(rule) = rules.rule_for(id) else {
                return term;
            };
            if unfolded.args.len() < rule.pattern.body.args_captured {
                return term;
            }
            match self.try_rule(rule, unfolded.args) {
                Some(next) => term = next,
                None => return term,
            }
        }
    }

    fn try_rule(&mut self, rule: &Rule, args: Vec<Term>) -> Option<Term> {
        let mut captures = Vec::with_capacity(rule.pattern.capture_count());
        let mut remaining = args.into_iter();
        for step in &rule.pattern.body.steps {
            match step {
                PatternStep::PullArgument => captures.push(remaining.next()?),
                PatternStep::Match { substitution, expected_head, args_captured } => {
                    let subject = self.arena.substitute(substitution, &captures);
                    let subject = self.normalize(subject);
                    let unfolded = subject.unfold();
                    if &unfolded.head != expected_head || unfolded.args.len() != *args_captured {
                        return None;
                    }
                    captures.extend(unfolded.args);
                }
            }
        }
        let replacement = self.arena.substitute(&rule.replacement, &captures);
        Some(self.arena.apply_all(replacement, remaining))
    }
}

/// Whether the head of `term` can never change by reduction or by applying it to
/// further arguments.
pub fn is_head_closed(term: &Term) -> bool {
    matches!(term.head().kind(), TermKind::Axiom(_) | TermKind::Argument(_) | TermKind::Data(_))
}

/// Whether `term` is a rule head applied to fewer arguments than the rule needs.
pub fn is_lambda_like(term: &Term, rules: &RuleCollector) -> bool {
    let unfolded = term.unfold();
    unfolded
        .head
        .as_declaration()
        .and_then(|id| rules.rule_for(id))
        .is_some_and(|rule| unfolded.args.len() < rule.pattern.body.args_captured)
}
