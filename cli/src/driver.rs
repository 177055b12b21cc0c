//! Executes script commands against one engine session and reports what
//! each did.

use engine::{
    apply_under_binders, apply_under_binders_at, can_apply, evaluate, traverse_apply, ApplyConfig,
    ApplyLemma, Assumption, Identity, Mode, RewriteBy, Session, TacticError, Target,
    Transformation,
};
use frontend::{
    parse_script, Command, CommandError, ElabError, Elaborator, Options, SolverChoice,
    SurfaceTerm, Tactic,
};
use kernel::checker::Env;
use kernel::{Printer, Term, TypeError};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Elab(#[from] ElabError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error("{}", .0.render())]
    Tactic(#[from] TacticError),
    #[error("`{name}` is stated as {expected} but its value has type {found}")]
    Mismatch {
        name: String,
        expected: String,
        found: String,
    },
}

/// Session-wide defaults; commands may override them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverOptions {
    pub mode: Mode,
    pub max_depth: Option<usize>,
}

/// Output of a script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub output: String,
    /// A command failed; nothing after it was run.
    pub failed: bool,
}

pub fn run_script(source: &str, options: DriverOptions) -> Transcript {
    Driver::new(options).run(source)
}

pub struct Driver {
    session: Session,
    options: DriverOptions,
}

impl Driver {
    pub fn new(options: DriverOptions) -> Self {
        Driver {
            session: Session::new(Env::with_equality()),
            options,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run every command of `source`, echoing each one, up to the first failure.
    pub fn run(&mut self, source: &str) -> Transcript {
        let mut output = String::new();
        let items = match parse_script(source) {
            Ok(items) => items,
            Err(err) => {
                return Transcript {
                    output: format!("error: {}\n", err),
                    failed: true,
                }
            }
        };
        for item in items {
            let text = source
                .get(item.span.start..item.span.end)
                .unwrap_or_default()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            output.push_str(&format!("> {}\n", text));
            debug!(command = %text, "executing");
            match self.execute(&item.command) {
                Ok(report) => {
                    output.push_str(&report);
                    output.push('\n');
                }
                Err(err) => {
                    warn!(line = item.span.line, "command failed");
                    output.push_str(&format!("error: {}\n", err));
                    return Transcript {
                        output,
                        failed: true,
                    };
                }
            }
        }
        Transcript {
            output,
            failed: false,
        }
    }

    fn print(&self, term: &Rc<Term>) -> String {
        Printer::with_context(self.session.ctx()).print(&self.session.instantiate(term))
    }

    fn elaborate(&self, term: &SurfaceTerm) -> Result<Rc<Term>, ElabError> {
        Elaborator::with_context(self.session.env(), self.session.ctx()).elaborate(term)
    }

    /// Elaborate a statement and make sure it is well formed.
    fn statement(&self, term: &SurfaceTerm) -> Result<Rc<Term>, DriverError> {
        let ty = self.elaborate(term)?;
        self.session.infer(&ty)?;
        Ok(ty)
    }

    fn check_value(&mut self, name: &str, ty: &Rc<Term>, val: &Rc<Term>) -> Result<(), DriverError> {
        let found = self.session.infer(val)?;
        let matches = self.session.probe(|s| Ok(s.unify(ty, &found).is_ok()))?;
        if matches {
            Ok(())
        } else {
            Err(DriverError::Mismatch {
                name: name.to_string(),
                expected: self.print(ty),
                found: self.print(&found),
            })
        }
    }

    fn config(&self, options: &Options) -> ApplyConfig {
        let mode = match options.deferred {
            Some(true) => Mode::Deferred,
            Some(false) => Mode::Eager,
            None => self.options.mode,
        };
        let config = ApplyConfig::new()
            .with_mode(mode)
            .with_max_depth(options.max_depth.or(self.options.max_depth));
        match options.solver {
            Some(SolverChoice::Assumption) => config.with_solver(Assumption),
            Some(SolverChoice::None) | None => config,
        }
    }

    fn transformation(&self, tactic: &Tactic) -> Result<Box<dyn Transformation>, DriverError> {
        Ok(match tactic {
            Tactic::Identity => Box::new(Identity),
            Tactic::Assumption => Box::new(Assumption),
            Tactic::Apply(lemma) => {
                let lemma = self.elaborate(lemma)?;
                let label = self.print(&lemma);
                Box::new(ApplyLemma::new(lemma).named(label))
            }
            Tactic::Rewrite { equation, reverse } => {
                let equation = self.elaborate(equation)?;
                let label = self.print(&equation);
                let rw = RewriteBy::new(equation).named(label);
                Box::new(if *reverse { rw.reversed() } else { rw })
            }
        })
    }

    fn goal_lines(&self) -> Vec<String> {
        self.session
            .goals()
            .iter()
            .filter_map(|g| self.session.goal_type(*g).ok())
            .map(|ty| format!("⊢ {}", self.print(&ty)))
            .collect()
    }

    fn goals_report(&self) -> String {
        let lines = self.goal_lines();
        if lines.is_empty() {
            "no goals".to_string()
        } else {
            lines.join("\n")
        }
    }

    /// Context facts, then open goals.
    pub fn state(&self) -> String {
        let mut lines: Vec<String> = self
            .session
            .ctx()
            .iter()
            .map(|fact| match &fact.value {
                Some(value) => format!(
                    "{} : {} := {}",
                    fact.name,
                    self.print(&fact.statement),
                    self.print(value)
                ),
                None => format!("{} : {}", fact.name, self.print(&fact.statement)),
            })
            .collect();
        lines.push(self.goals_report());
        lines.join("\n")
    }

    /// Run one command, returning what it reports.
    pub fn execute(&mut self, command: &Command) -> Result<String, DriverError> {
        match command {
            Command::Axiom { name, ty } => {
                let ty = self.statement(ty)?;
                self.session.env_mut().add_axiom(name.clone(), ty.clone())?;
                Ok(format!("axiom {} : {}", name, self.print(&ty)))
            }
            Command::Def { name, ty, val } => {
                let ty = self.statement(ty)?;
                let val = self.elaborate(val)?;
                self.check_value(name, &ty, &val)?;
                self.session.env_mut().add_def(name.clone(), ty.clone(), val)?;
                Ok(format!("def {} : {}", name, self.print(&ty)))
            }
            Command::Hyp { name, ty } => {
                let ty = self.statement(ty)?;
                self.session.assume(name, ty.clone())?;
                Ok(format!("{} : {}", name, self.print(&ty)))
            }
            Command::Have { name, ty, val } => {
                let ty = self.statement(ty)?;
                let val = self.elaborate(val)?;
                self.check_value(name, &ty, &val)?;
                self.session.define(name, ty.clone(), val)?;
                Ok(format!("{} : {}", name, self.print(&ty)))
            }
            Command::Goal(ty) => {
                let ty = self.statement(ty)?;
                self.session.add_goal(ty.clone());
                Ok(format!("⊢ {}", self.print(&ty)))
            }
            Command::Run { tactic, at, options } => {
                let transformation = self.transformation(tactic)?;
                let config = self.config(options);
                match at {
                    Some(name) => {
                        let result = apply_under_binders_at(
                            &mut self.session,
                            transformation.as_ref(),
                            name,
                            &config,
                        )?;
                        let mut lines = Vec::new();
                        if let Some(fact) = &result.fact {
                            lines.push(format!(
                                "{} : {} (depth {})",
                                fact.name,
                                self.print(&fact.statement),
                                result.depth
                            ));
                        }
                        lines.push(self.goals_report());
                        Ok(lines.join("\n"))
                    }
                    None => {
                        let result =
                            apply_under_binders(&mut self.session, transformation.as_ref(), &config)?;
                        self.session.prune_goals();
                        Ok(format!(
                            "{} at depth {}\n{}",
                            transformation.name(),
                            result.depth,
                            self.goals_report()
                        ))
                    }
                }
            }
            Command::CanApply { tactic, at, options } => {
                let transformation = self.transformation(tactic)?;
                let config = self.config(options);
                let target = match at {
                    Some(name) => Target::Fact(name.clone()),
                    None => Target::Goal,
                };
                let depth = can_apply(&mut self.session, transformation.as_ref(), &target, &config)?;
                Ok(format!("{} applies at depth {}", transformation.name(), depth))
            }
            Command::Eval { tactic, expr, options } => {
                let transformation = self.transformation(tactic)?;
                let config = self.config(options);
                let expr = self.elaborate(expr)?;
                let value = evaluate(&mut self.session, transformation.as_ref(), &config, &expr)?;
                let ty = self.session.infer(&value)?;
                Ok(format!("{} : {}", self.print(&value), self.print(&ty)))
            }
            Command::Traverse { tactic, expr, options } => {
                let transformation = self.transformation(tactic)?;
                let config = self.config(options);
                let expr = self.elaborate(expr)?;
                let value =
                    traverse_apply(&mut self.session, transformation.as_ref(), &config, &expr)?;
                let ty = self.session.infer(&value)?;
                Ok(format!("{} : {}", self.print(&value), self.print(&ty)))
            }
            Command::Show => Ok(self.state()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRELUDE: &str = "
        (axiom A Type)
        (axiom a A)
        (axiom B (-> A Prop))
        (axiom C (-> A Prop))
        (axiom L (forall (x A) (-> (B x) (C x))))
    ";

    fn run(script: &str) -> Transcript {
        run_script(&format!("{}\n{}", PRELUDE, script), DriverOptions::default())
    }

    #[test]
    fn goal_commands_report_remaining_goals() {
        let transcript = run("(goal (forall (x A) (C x)))\n(apply L)");
        assert!(!transcript.failed, "{}", transcript.output);
        assert!(transcript.output.ends_with("> (apply L)\napply L at depth 1\n⊢ ∀ x : A, B x\n"));
    }

    #[test]
    fn execution_stops_at_the_first_failure() {
        let transcript = run("(goal (C a))\n(apply B)\n(show)");
        assert!(transcript.failed);
        assert!(!transcript.output.contains("> (show)"));
        assert!(transcript.output.contains("error: transformation failed"));
    }

    #[test]
    fn stated_types_are_checked() {
        let transcript = run("(have h (B a) a)");
        assert!(transcript.failed);
        assert!(transcript.output.contains("`h` is stated as B a but its value has type A"));
    }

    #[test]
    fn command_options_override_defaults() {
        let driver = Driver::new(DriverOptions {
            mode: Mode::Deferred,
            max_depth: Some(4),
        });
        let config = driver.config(&Options {
            deferred: Some(false),
            solver: None,
            max_depth: None,
        });
        assert_eq!(config.mode, Mode::Eager);
        assert_eq!(config.max_depth, Some(4));
        assert_eq!(config.solver.name(), "id");
    }
}
