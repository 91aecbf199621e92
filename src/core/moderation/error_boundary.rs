// The one place where handler failures stop.
//
// The dispatcher wraps every handler call in `run_guarded`; anything that
// escapes a handler is logged here and swallowed so the update loop keeps going.

use std::fmt::Display;
use std::future::Future;

pub async fn run_guarded<F, T, E>(handler: &'static str, work: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match work.await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(handler, "Unhandled error in handler: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::ModerationError;

    #[tokio::test]
    async fn test_passes_through_success() {
        let result = run_guarded("ok", async { Ok::<_, ModerationError>(5) }).await;
        assert_eq!(result, Some(5));
    }

    #[tokio::test]
    async fn test_swallows_errors() {
        let result = run_guarded("broken", async {
            Err::<u8, _>(ModerationError::StorageError("down".into()))
        })
        .await;
        assert_eq!(result, None);
    }
}
