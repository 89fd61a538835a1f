//! Business services orchestrating the access validators and data stores.

pub mod auth;
pub mod patients;
pub mod users;

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{AppError, AppResult};

/// Run a store-backed future under the configured deadline.
pub(crate) async fn within<T, E>(deadline: Duration, fut: impl Future<Output = Result<T, E>>) -> AppResult<T>
where
    AppError: From<E>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => {
            warn!(?deadline, "data store deadline exceeded");
            Err(AppError::Internal("data store deadline exceeded".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use clinica_core::store::StoreError;

    use super::*;

    #[tokio::test]
    async fn deadline_exceeded_is_internal() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, StoreError>(())
        };
        let err = within(Duration::from_millis(10), slow).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn errors_are_converted() {
        let failing = async { Err::<(), _>(StoreError::NotFound("patient 1".into())) };
        let err = within(Duration::from_secs(1), failing).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
