use crate::informer::Informer;
use crate::object::WatchedResource;
use fabric_controller_k8s_api::{watcher, Api};
use futures::prelude::*;
use std::sync::Arc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Drives one informer from its typed watch stream until the stop token
/// fires. Stream failures are logged and retried after a short pause; the
/// informer only ever sees clean events.
pub(crate) async fn run<T: WatchedResource>(
    api: Api<T>,
    informer: Arc<Informer>,
    stop: CancellationToken,
) {
    let mut stream = watcher(api, watcher::Config::default()).boxed();
    loop {
        let event = tokio::select! {
            _ = stop.cancelled() => return,
            event = stream.next() => match event {
                Some(Ok(event)) => event,
                Some(Err(error)) => {
                    info!(kind = %T::KIND, %error, "watch disconnected");
                    time::sleep(time::Duration::from_secs(1)).await;
                    continue;
                }
                None => return,
            },
        };

        match event {
            watcher::Event::Applied(obj) => {
                informer.apply(T::into_object(Arc::new(obj))).await;
            }
            watcher::Event::Deleted(obj) => {
                informer.delete(T::into_object(Arc::new(obj))).await;
            }
            watcher::Event::Restarted(objs) => {
                let objs = objs
                    .into_iter()
                    .map(|obj| T::into_object(Arc::new(obj)))
                    .collect();
                informer.resync(objs).await;
            }
        }
    }
}
