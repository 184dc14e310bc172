use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

/// Runs `poll` on a jittered interval until `shutdown` resolves. A
/// semaphore bounds in-flight poll ticks, and the sleep between ticks is
/// jittered 10% in either direction so multiple schedulers don't lockstep.
pub async fn run_poll_loop<F, Fut>(
    permits: usize,
    poll_interval: Duration,
    mut poll: F,
    shutdown: impl Future<Output = ()>,
) where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = ()> + Send,
{
    let semaphore = Arc::new(Semaphore::new(permits));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            permit = semaphore.clone().acquire_owned() => {
                let permit = permit.expect("semaphore never closed");
                poll().await;
                drop(permit);

                let jitter = 0.9 + rand::random::<f64>() * 0.2;
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval.mul_f64(jitter)) => {}
                    _ = &mut shutdown => break,
                }
            }
        }
    }

    tracing::info!("scheduler poll loop signaled to stop; draining in-flight work");
    let _ = semaphore.acquire_many(permits as u32).await;
}
