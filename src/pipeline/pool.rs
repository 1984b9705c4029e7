// src/pipeline/pool.rs

use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
    time::Instant,
};
use tracing::{error, info, info_span, Instrument};

use super::{Pipeline, PipelineResult};

impl Pipeline {
    /// Run `process` for every URL on a pool of `workers()` tasks.
    ///
    /// URLs go through a bounded queue; each worker takes the next one as soon
    /// as it is free, so results arrive in completion order. `on_result` sees
    /// each one as it lands. Every URL yields exactly one result, even if the
    /// worker handling it dies.
    pub async fn run_all<F>(self: Arc<Self>, urls: Vec<String>, mut on_result: F) -> Vec<PipelineResult>
    where
        F: FnMut(&PipelineResult),
    {
        let total = urls.len();
        let workers = self.workers.min(total).max(1);
        let start = Instant::now();
        info!(total, workers, "starting pipelines");

        let (job_tx, job_rx) = mpsc::channel::<String>(workers);
        let jobs = Arc::new(Mutex::new(job_rx));
        let (res_tx, mut res_rx) = mpsc::unbounded_channel::<PipelineResult>();

        let mut pool = JoinSet::new();
        for worker in 1..=workers {
            let pipeline = Arc::clone(&self);
            let jobs = Arc::clone(&jobs);
            let res_tx = res_tx.clone();
            pool.spawn(async move {
                loop {
                    // only one idle worker waits on the queue at a time
                    let next = jobs.lock().await.recv().await;
                    let Some(url) = next else { break };
                    let span = info_span!("pipeline", worker, url = %url);
                    let result = pipeline.process(&url).instrument(span).await;
                    if res_tx.send(result).is_err() {
                        break;
                    }
                }
            });
        }
        // the workers own the queue and result senders from here on
        drop(jobs);
        drop(res_tx);

        let expected = urls.clone();
        let producer = tokio::spawn(async move {
            for url in urls {
                if job_tx.send(url).await.is_err() {
                    error!("all workers gone; stopping queue");
                    break;
                }
            }
        });

        let mut results = Vec::with_capacity(total);
        while let Some(result) = res_rx.recv().await {
            info!(url = %result.url, stage = result.stage().as_str(), ok = result.is_success(), "pipeline finished");
            on_result(&result);
            results.push(result);
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker task failed");
            }
        }
        if let Err(e) = producer.await {
            error!(error = %e, "queue task failed");
        }

        // anything still owed a result was lost with its worker
        let mut owed: HashMap<&str, usize> = HashMap::new();
        for url in &expected {
            *owed.entry(url.as_str()).or_default() += 1;
        }
        for r in &results {
            if let Some(n) = owed.get_mut(r.url.as_str()) {
                *n = n.saturating_sub(1);
            }
        }
        let mut lost = Vec::new();
        for url in &expected {
            if let Some(n) = owed.get_mut(url.as_str()) {
                if *n > 0 {
                    *n -= 1;
                    lost.push(PipelineResult::aborted(url, "worker stopped before finishing"));
                }
            }
        }
        for result in lost {
            error!(url = %result.url, "no result from worker");
            on_result(&result);
            results.push(result);
        }

        info!(total = results.len(), elapsed = ?start.elapsed(), "all pipelines done");
        results
    }
}
