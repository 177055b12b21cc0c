use crate::config::ApplyConfig;
use crate::error::TacticResult;
use crate::evaluate::evaluate;
use crate::session::Session;
use crate::transform::Transformation;
use kernel::Term;
use std::rc::Rc;
use tracing::{debug, trace};

/// Apply `transformation` at the innermost base node of `expr`, keeping
/// every enclosing binder (name, domain and order) as it was.
///
/// Deeper stopping points are tried first; if going one binder further
/// fails, the current node is evaluated as a whole instead. A re-closing
/// failure is never retried.
pub fn traverse_apply(
    session: &mut Session,
    transformation: &dyn Transformation,
    config: &ApplyConfig,
    expr: &Rc<Term>,
) -> TacticResult<Rc<Term>> {
    traverse_at(session, transformation, config, expr, 0)
}

fn traverse_at(
    session: &mut Session,
    transformation: &dyn Transformation,
    config: &ApplyConfig,
    expr: &Rc<Term>,
    depth: usize,
) -> TacticResult<Rc<Term>> {
    let expr = session.instantiate(expr);
    let binder = match expr.as_binder() {
        Some(binder) if config.max_depth.map_or(true, |max| depth < max) => binder,
        _ => return evaluate(session, transformation, config, &expr),
    };

    trace!(depth, binder = %binder.name, "descending");
    let deeper = session.isolated(|s| {
        let mark = s.mark();
        let (opened, body) = s.intro(&binder)?;
        let inner = traverse_at(s, transformation, config, &body, depth + 1)?;
        s.reclose_binder(&opened, mark)?;
        Ok(binder.rebuild(s.instantiate(&inner).abstract_fvar(opened.id)))
    });

    match deeper {
        Ok(result) => Ok(result),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            debug!(depth, binder = %binder.name, error = %err, "falling back to a shallower stopping point");
            evaluate(session, transformation, config, &expr).map_err(|_| err)
        }
    }
}
