use crate::expander::{ExpansionError, Expander};
use crate::parser::{ParseError, Parser};
use crate::surface::{
    Command, CommandItem, Options, SolverChoice, Span, SurfaceTerm, Syntax, SyntaxKind, Tactic,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Expansion(#[from] ExpansionError),
    #[error("{1}: unknown command `{0}`")]
    UnknownCommand(String, Span),
    #[error("{1}: {0}")]
    Malformed(String, Span),
}

fn malformed<T>(message: impl Into<String>, span: Span) -> Result<T, CommandError> {
    Err(CommandError::Malformed(message.into(), span))
}

/// Parse a whole script into commands.
pub fn parse_script(source: &str) -> Result<Vec<CommandItem>, CommandError> {
    let syntax = Parser::new(source).parse()?;
    CommandParser::new().parse(syntax)
}

#[derive(Debug, Default)]
pub struct CommandParser {
    expander: Expander,
}

impl CommandParser {
    pub fn new() -> Self {
        CommandParser {
            expander: Expander::new(),
        }
    }

    pub fn parse(&self, syntax_nodes: Vec<Syntax>) -> Result<Vec<CommandItem>, CommandError> {
        syntax_nodes
            .iter()
            .map(|syntax| {
                Ok(CommandItem {
                    command: self.parse_command(syntax)?,
                    span: syntax.span,
                })
            })
            .collect()
    }

    pub fn parse_command(&self, syntax: &Syntax) -> Result<Command, CommandError> {
        let SyntaxKind::List(items) = &syntax.kind else {
            return malformed(
                format!("expected a command, found `{}`", syntax.pretty_print()),
                syntax.span,
            );
        };
        let Some((head, args)) = items.split_first() else {
            return malformed("empty command", syntax.span);
        };
        let Some(keyword) = head.as_symbol() else {
            return malformed("a command starts with its name", head.span);
        };
        let span = syntax.span;

        match keyword {
            "axiom" | "hyp" => {
                let [name, ty] = args else {
                    return malformed(format!("usage: ({} NAME TYPE)", keyword), span);
                };
                let name = self.name(name)?;
                let ty = self.term(ty)?;
                Ok(if keyword == "axiom" {
                    Command::Axiom { name, ty }
                } else {
                    Command::Hyp { name, ty }
                })
            }
            "def" | "have" => {
                let [name, ty, val] = args else {
                    return malformed(format!("usage: ({} NAME TYPE VALUE)", keyword), span);
                };
                let name = self.name(name)?;
                let ty = self.term(ty)?;
                let val = self.term(val)?;
                Ok(if keyword == "def" {
                    Command::Def { name, ty, val }
                } else {
                    Command::Have { name, ty, val }
                })
            }
            "goal" => match args {
                [ty] => Ok(Command::Goal(self.term(ty)?)),
                _ => malformed("usage: (goal TYPE)", span),
            },
            "show" => match args {
                [] => Ok(Command::Show),
                _ => malformed("usage: (show)", span),
            },
            "apply" | "rw" | "assumption" | "id" => {
                let (tactic, rest) = self.tactic_form(keyword, args, span)?;
                let (at, rest) = self.at_clause(rest)?;
                let options = self.options(rest)?;
                Ok(Command::Run { tactic, at, options })
            }
            "can-apply" => {
                let Some((tactic, rest)) = args.split_first() else {
                    return malformed("usage: (can-apply TACTIC [at FACT])", span);
                };
                let tactic = self.tactic(tactic)?;
                let (at, rest) = self.at_clause(rest)?;
                let options = self.options(rest)?;
                Ok(Command::CanApply { tactic, at, options })
            }
            "eval" | "traverse" => {
                let [tactic, expr, rest @ ..] = args else {
                    return malformed(format!("usage: ({} TACTIC EXPR)", keyword), span);
                };
                let tactic = self.tactic(tactic)?;
                let expr = self.term(expr)?;
                let options = self.options(rest)?;
                Ok(if keyword == "eval" {
                    Command::Eval { tactic, expr, options }
                } else {
                    Command::Traverse { tactic, expr, options }
                })
            }
            other => Err(CommandError::UnknownCommand(other.to_string(), head.span)),
        }
    }

    fn name(&self, syntax: &Syntax) -> Result<String, CommandError> {
        match syntax.as_symbol() {
            Some(name) => Ok(name.to_string()),
            None => malformed("expected a name", syntax.span),
        }
    }

    fn term(&self, syntax: &Syntax) -> Result<SurfaceTerm, CommandError> {
        Ok(self.expander.expand(syntax)?)
    }

    /// `assumption`, `id`, `(apply L)`, `(rw H)` or `(rw <- H)`.
    fn tactic(&self, syntax: &Syntax) -> Result<Tactic, CommandError> {
        match &syntax.kind {
            SyntaxKind::Symbol(s) if s == "assumption" || s == "id" => {
                let (tactic, _) = self.tactic_form(s, &[], syntax.span)?;
                Ok(tactic)
            }
            SyntaxKind::List(items) => {
                let Some((head, args)) = items.split_first() else {
                    return malformed("empty tactic", syntax.span);
                };
                let Some(keyword) = head.as_symbol() else {
                    return malformed("expected a tactic name", head.span);
                };
                let (tactic, rest) = self.tactic_form(keyword, args, syntax.span)?;
                if let Some(extra) = rest.first() {
                    return malformed("unexpected argument to tactic", extra.span);
                }
                Ok(tactic)
            }
            _ => malformed(
                format!("expected a tactic, found `{}`", syntax.pretty_print()),
                syntax.span,
            ),
        }
    }

    /// Parse the tactic arguments at the front of `args`, returning the rest.
    fn tactic_form<'s>(
        &self,
        keyword: &str,
        args: &'s [Syntax],
        span: Span,
    ) -> Result<(Tactic, &'s [Syntax]), CommandError> {
        match keyword {
            "id" => Ok((Tactic::Identity, args)),
            "assumption" => Ok((Tactic::Assumption, args)),
            "apply" => match args.split_first() {
                Some((lemma, rest)) => Ok((Tactic::Apply(self.term(lemma)?), rest)),
                None => malformed("usage: (apply LEMMA)", span),
            },
            "rw" => {
                let (reverse, args) = match args.split_first() {
                    Some((arrow, rest)) if matches!(arrow.as_symbol(), Some("<-") | Some("←")) => {
                        (true, rest)
                    }
                    _ => (false, args),
                };
                match args.split_first() {
                    Some((equation, rest)) => Ok((
                        Tactic::Rewrite {
                            equation: self.term(equation)?,
                            reverse,
                        },
                        rest,
                    )),
                    None => malformed("usage: (rw [<-] EQUATION)", span),
                }
            }
            other => malformed(format!("unknown tactic `{}`", other), span),
        }
    }

    fn at_clause<'s>(
        &self,
        args: &'s [Syntax],
    ) -> Result<(Option<String>, &'s [Syntax]), CommandError> {
        match args {
            [at, fact, rest @ ..] if at.as_symbol() == Some("at") => {
                Ok((Some(self.name(fact)?), rest))
            }
            [at] if at.as_symbol() == Some("at") => malformed("`at` needs a fact name", at.span),
            _ => Ok((None, args)),
        }
    }

    fn options(&self, mut args: &[Syntax]) -> Result<Options, CommandError> {
        let mut options = Options::default();
        while let Some((flag, rest)) = args.split_first() {
            args = rest;
            match flag.as_symbol() {
                Some(":deferred") => options.deferred = Some(true),
                Some(":eager") => options.deferred = Some(false),
                Some(":solver") => {
                    let Some((choice, rest)) = args.split_first() else {
                        return malformed("`:solver` needs `assumption` or `none`", flag.span);
                    };
                    args = rest;
                    options.solver = Some(match choice.as_symbol() {
                        Some("assumption") => SolverChoice::Assumption,
                        Some("none") => SolverChoice::None,
                        _ => return malformed("`:solver` needs `assumption` or `none`", choice.span),
                    });
                }
                Some(":max-depth") => {
                    let Some((Syntax { kind: SyntaxKind::Int(n), .. }, rest)) = args.split_first() else {
                        return malformed("`:max-depth` needs a number", flag.span);
                    };
                    args = rest;
                    options.max_depth = Some(*n as usize);
                }
                _ => {
                    return malformed(
                        format!("unexpected `{}`", flag.pretty_print()),
                        flag.span,
                    )
                }
            }
        }
        Ok(options)
    }
}
