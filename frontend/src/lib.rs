//! Script language for driving the engine: an s-expression reader, an
//! expander to surface terms and commands, and an elaborator to kernel terms.

pub mod command_parser;
pub mod elaborator;
pub mod expander;
pub mod parser;
pub mod surface;

pub use command_parser::{parse_script, CommandError, CommandParser};
pub use elaborator::{ElabError, Elaborator};
pub use expander::{ExpansionError, Expander};
pub use parser::{ParseError, Parser};
pub use surface::*;

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::checker::Env;
    use kernel::Term;

    #[test]
    fn test_parse_and_elaborate() {
        let mut env = Env::new();
        env.add_axiom("A", Term::sort(1)).unwrap();
        let syntax = Parser::new("(fun (x A) x)").parse().expect("Failed to parse");
        assert_eq!(syntax.len(), 1);
        let surface = Expander::new().expand(&syntax[0]).expect("Failed to expand");
        let term = Elaborator::new(&env).elaborate(&surface).expect("Failed to elaborate");
        assert_eq!(term, Term::lam("x", Term::cnst("A"), Term::bvar(0)));
    }
}
