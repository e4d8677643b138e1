//! All-or-nothing execution for ledger calls.
//!
//! Ledgers commit their own bookkeeping before calling out to custody, so a
//! custody failure happens after state was already touched. Running the call
//! against a checkpoint and restoring it on error gives the host the
//! transactional semantics it expects: a failed call leaves no trace.

/// Runs `op` against `state`, restoring the pre-call state if it fails.
pub(crate) fn atomically<S, T, E>(
    state: &mut S,
    op: impl FnOnce(&mut S) -> Result<T, E>,
) -> Result<T, E>
where
    S: Clone,
{
    let checkpoint = state.clone();
    let result = op(state);
    if result.is_err() {
        *state = checkpoint;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_keeps_changes() {
        let mut v = vec![1, 2];
        let r: Result<usize, ()> = atomically(&mut v, |v| {
            v.push(3);
            Ok(v.len())
        });
        assert_eq!(r, Ok(3));
        assert_eq!(v, vec![1, 2, 3]);
    }

    #[test]
    fn failure_restores_checkpoint() {
        let mut v = vec![1, 2];
        let r: Result<(), &str> = atomically(&mut v, |v| {
            v.clear();
            Err("boom")
        });
        assert_eq!(r, Err("boom"));
        assert_eq!(v, vec![1, 2]);
    }
}
