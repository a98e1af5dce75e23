use std::future::Future;
use std::time::Duration;

use crate::{Error, Result};

/// Run `fut` under a deadline; expiry becomes `Error::Timeout` naming `what`.
pub async fn with_deadline<T, F>(what: &'static str, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(res) => res,
        Err(_) => Err(Error::Timeout { what, after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_inner_result() {
        let v = with_deadline("noop", Duration::from_secs(1), async { Ok::<_, Error>(7) })
            .await
            .unwrap();
        assert_eq!(v, 7);
    }

    #[tokio::test]
    async fn expiry_names_the_operation() {
        let err = with_deadline("store read", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, Error>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout { what: "store read", .. }));
    }
}
