//! Bounded retry for inserts keyed by freshly generated ids.

use crate::constants::MAX_ID_ATTEMPTS;
use crate::error::AppError;
use crate::naming::IdSource;

/// Outcome of one insert attempt.
pub(crate) enum Attempt<T> {
    Inserted(T),
    /// The candidate id is taken; the attempt's transaction was aborted.
    Collision,
}

/// Run `attempt` with fresh ids until one inserts or [`MAX_ID_ATTEMPTS`] collide.
///
/// Errors other than a collision end the loop immediately.
///
/// # Arguments
/// - `ids`: Candidate id source.
/// - `what`: Entity name used in logs and the exhaustion error.
/// - `attempt`: Insert routine for one candidate id.
///
/// # Errors
/// Returns [`AppError::Conflict`] once every attempt collided, or the first
/// non-collision error from `attempt`.
pub(crate) fn with_fresh_ids<T, F>(
    ids: &dyn IdSource,
    what: &str,
    mut attempt: F,
) -> Result<T, AppError>
where
    F: FnMut(String) -> Result<Attempt<T>, AppError>,
{
    for attempt_no in 1..=MAX_ID_ATTEMPTS {
        let id = ids.next_id();
        match attempt(id)? {
            Attempt::Inserted(value) => return Ok(value),
            Attempt::Collision => {
                tracing::debug!(attempt = attempt_no, "{} id collision; retrying", what);
            }
        }
    }
    Err(AppError::Conflict(format!(
        "failed to create {} because of duplicate ids after {} attempts",
        what, MAX_ID_ATTEMPTS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedIds;
    use std::collections::HashSet;

    fn run(ids: &ScriptedIds, taken: &HashSet<String>) -> (Result<String, AppError>, usize) {
        let mut calls = 0;
        let result = with_fresh_ids(ids, "document", |id| {
            calls += 1;
            if taken.contains(&id) {
                Ok(Attempt::Collision)
            } else {
                Ok(Attempt::Inserted(id))
            }
        });
        (result, calls)
    }

    #[test]
    fn succeeds_on_last_allowed_attempt() {
        let taken: HashSet<String> = ["dupedupe".to_string()].into();
        let ids = ScriptedIds::new(vec!["dupedupe"; MAX_ID_ATTEMPTS - 1]);

        let (result, calls) = run(&ids, &taken);
        let id = result.expect("ninth collision still leaves one attempt");
        assert_ne!(id, "dupedupe");
        assert_eq!(calls, MAX_ID_ATTEMPTS);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let taken: HashSet<String> = ["dupedupe".to_string()].into();
        let ids = ScriptedIds::new(vec!["dupedupe"; MAX_ID_ATTEMPTS + 5]);

        let (result, calls) = run(&ids, &taken);
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(calls, MAX_ID_ATTEMPTS);
    }

    #[test]
    fn non_collision_errors_stop_immediately() {
        let ids = ScriptedIds::new(Vec::<&str>::new());
        let mut calls = 0;
        let result: Result<(), AppError> = with_fresh_ids(&ids, "webhook", |_| {
            calls += 1;
            Err(AppError::StorageMessage("disk on fire".to_string()))
        });
        assert!(matches!(result, Err(AppError::StorageMessage(_))));
        assert_eq!(calls, 1);
    }
}
