use crate::driver::{Driver, DriverOptions};
use anyhow::Result;
use frontend::parse_script;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const HELP: &str = "\
Commands are s-expressions, e.g. (hyp h (P a)), (goal (forall (x A) (Q x))), (apply L).
  :show   Print the context and the open goals
  :help   Show this message
  :quit   Exit the REPL";

/// Parentheses opened and not yet closed; input is buffered until this is zero.
fn depth(text: &str) -> i64 {
    let mut open = 0;
    for line in text.lines() {
        let code = line.split(';').next().unwrap_or_default();
        for c in code.chars() {
            match c {
                '(' | '{' => open += 1,
                ')' | '}' => open -= 1,
                _ => {}
            }
        }
    }
    open
}

/// Interpret one complete input against `driver`.
pub fn eval_input(driver: &mut Driver, input: &str) -> String {
    match input.trim() {
        ":show" => return driver.state(),
        ":help" => return HELP.to_string(),
        _ => {}
    }
    let items = match parse_script(input) {
        Ok(items) => items,
        Err(err) => return format!("error: {}", err),
    };
    let mut out = Vec::new();
    for item in items {
        match driver.execute(&item.command) {
            Ok(report) => out.push(report),
            Err(err) => {
                out.push(format!("error: {}", err));
                break;
            }
        }
    }
    out.join("\n")
}

pub fn start(options: DriverOptions) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut driver = Driver::new(options);
    let mut buffer = String::new();

    println!("ub {} (:help for help, :quit to exit)", env!("CARGO_PKG_VERSION"));
    loop {
        let prompt = if buffer.is_empty() { "ub> " } else { "... " };
        match rl.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() {
                    match line.trim() {
                        "" => continue,
                        ":quit" | ":exit" => break,
                        _ => {}
                    }
                }
                buffer.push_str(&line);
                buffer.push('\n');
                if depth(&buffer) > 0 {
                    continue;
                }
                let input = std::mem::take(&mut buffer);
                rl.add_history_entry(input.trim())?;
                println!("{}", eval_input(&mut driver, &input));
            }
            Err(ReadlineError::Interrupted) => buffer.clear(),
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
