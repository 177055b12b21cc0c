use crate::config::ApplyConfig;
use crate::error::TacticResult;
use crate::session::Session;
use crate::transform::{as_failure, check_determined, require_discharged, Transformation};
use kernel::Term;
use std::rc::Rc;
use tracing::debug;

const EVAL_NAME: &str = "_eval";

/// Run `transformation` forward on a free-standing expression.
///
/// The expression is bound to a private fact inside an isolated scope, so the
/// caller's context is untouched whether this succeeds or fails. The private
/// fact is substituted back out of the result.
pub fn evaluate(
    session: &mut Session,
    transformation: &dyn Transformation,
    config: &ApplyConfig,
    expr: &Rc<Term>,
) -> TacticResult<Rc<Term>> {
    session.isolated(|s| {
        let expr = s.instantiate(expr);
        let ty = s.infer(&expr)?;
        let mark = s.mark();
        let name = s.ctx().fresh_name(EVAL_NAME);
        let private = s.assume(&name, ty)?;
        let fact = s.find_fact(&name)?;

        let outcome = transformation
            .rewrite(s, &fact)
            .map_err(|err| as_failure(s, err))?;
        require_discharged(s, config.solver.as_ref(), mark, &outcome.side_conditions)?;
        check_determined(s, mark, config.mode)?;

        let result = s
            .instantiate(&outcome.fact.reference())
            .replace_fvar(private, &expr);
        debug!(transformation = %transformation.name(), %result, "evaluated");
        Ok(result)
    })
}
