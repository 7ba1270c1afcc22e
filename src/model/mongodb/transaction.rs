use std::future::Future;

use mongodb::error::TRANSIENT_TRANSACTION_ERROR;

use crate::error::{Error, Result};

/// Attempts made at a transaction before a transient failure is reported.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Run a transactional operation, starting it over when the server aborts it
/// with a transient error, e.g. a write conflict with a concurrent
/// transaction on the same documents.
///
/// Each attempt must open its own session, so an aborted attempt leaves
/// nothing behind.
pub async fn retry_transient<T, F, Fut>(what: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 1;
    loop {
        match attempt().await {
            Err(Error::Db(e))
                if attempts < MAX_TRANSACTION_ATTEMPTS
                    && e.contains_label(TRANSIENT_TRANSACTION_ERROR) =>
            {
                debug!("Retrying {what} (attempt {attempts} aborted: {e})");
                attempts += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[rocket::async_test]
    async fn other_failures_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<()> = retry_transient("test", || {
            calls.set(calls.get() + 1);
            async { Err(Error::Conflict("taken".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(calls.get(), 1);

        let result = retry_transient("test", || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
