//! Background sort worker.
//!
//! Large in-memory sorts run on a dedicated thread so the async runtime
//! never blocks on them. Requests and replies are correlated by id; a reply
//! nobody is waiting for any more is dropped.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

use crate::model::Row;
use crate::query::SortSpec;
use crate::query::sort_indices;

/// Message sent to the worker thread.
#[derive(Debug)]
pub enum WorkerRequest {
    /// Sort `indices` (positions into `rows`) by `sorts`.
    Sort {
        id: u64,
        rows: Arc<Vec<Row>>,
        indices: Vec<usize>,
        sorts: Vec<SortSpec>,
    },
}

/// Reply from the worker thread.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerResponse {
    Sorted {
        id: u64,
        indices: Vec<usize>,
        duration: Duration,
    },
    Error {
        id: u64,
        message: String,
        duration: Duration,
    },
}

impl WorkerResponse {
    /// Correlation id.
    pub fn id(&self) -> u64 {
        match self {
            WorkerResponse::Sorted { id, .. } | WorkerResponse::Error { id, .. } => *id,
        }
    }
}

type Pending = DashMap<u64, oneshot::Sender<WorkerResponse>>;

/// Handle to the sort thread. Cheap to clone; the thread exits once every
/// handle is dropped.
#[derive(Debug, Clone)]
pub struct SortWorker {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    pending: Arc<Pending>,
    next_id: Arc<AtomicU64>,
}

impl SortWorker {
    /// Starts the worker thread.
    pub fn spawn() -> std::io::Result<Self> {
        let (requests, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(Pending::new());

        let replies = pending.clone();
        std::thread::Builder::new()
            .name("datagrid-sort".to_string())
            .spawn(move || run(receiver, &replies))?;

        Ok(Self {
            requests,
            pending,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Sorts on the worker thread and waits for the reply.
    ///
    /// Errors when the worker is gone or the job failed; callers fall back
    /// to sorting in place.
    pub async fn sort(
        &self,
        rows: Arc<Vec<Row>>,
        indices: Vec<usize>,
        sorts: Vec<SortSpec>,
    ) -> Result<Vec<usize>, String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let request = WorkerRequest::Sort {
            id,
            rows,
            indices,
            sorts,
        };
        if self.requests.send(request).is_err() {
            self.pending.remove(&id);
            return Err("sort worker is not running".to_string());
        }

        match rx.await {
            Ok(WorkerResponse::Sorted {
                indices, duration, ..
            }) => {
                log::trace!("[offload] sort {} took {:?}", id, duration);
                Ok(indices)
            }
            Ok(WorkerResponse::Error { message, .. }) => Err(message),
            Err(_) => Err("sort worker dropped the request".to_string()),
        }
    }

    /// Number of requests awaiting a reply.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

fn run(mut receiver: mpsc::UnboundedReceiver<WorkerRequest>, pending: &Pending) {
    while let Some(request) = receiver.blocking_recv() {
        deliver(pending, handle(request));
    }
    log::debug!("[offload] sort worker stopped");
}

fn handle(request: WorkerRequest) -> WorkerResponse {
    let WorkerRequest::Sort {
        id,
        rows,
        mut indices,
        sorts,
    } = request;
    let started = Instant::now();

    if let Some(bad) = indices.iter().find(|&&i| i >= rows.len()) {
        return WorkerResponse::Error {
            id,
            message: format!("index {} out of bounds for {} rows", bad, rows.len()),
            duration: started.elapsed(),
        };
    }

    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        sort_indices(&rows, &mut indices, &sorts);
    }));
    match result {
        Ok(()) => WorkerResponse::Sorted {
            id,
            indices,
            duration: started.elapsed(),
        },
        Err(_) => WorkerResponse::Error {
            id,
            message: "sort panicked".to_string(),
            duration: started.elapsed(),
        },
    }
}

/// Routes a reply to its waiter. Unmatched replies are ignored.
fn deliver(pending: &Pending, response: WorkerResponse) {
    match pending.remove(&response.id()) {
        Some((_, waiter)) => {
            // The waiter may have given up; nothing to do then.
            let _ = waiter.send(response);
        }
        None => log::trace!("[offload] ignoring unmatched reply {}", response.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Arc<Vec<Row>> {
        Arc::new(
            [5i64, 3, 9, 1, 3]
                .into_iter()
                .enumerate()
                .map(|(i, v)| Row::new().set("v", v).set("i", i as i64))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_worker_matches_in_place_sort() {
        let worker = SortWorker::spawn().unwrap();
        let rows = rows();
        let sorts = vec![SortSpec::asc("v")];

        let offloaded = worker
            .sort(rows.clone(), (0..5).collect(), sorts.clone())
            .await
            .unwrap();

        let mut local: Vec<usize> = (0..5).collect();
        sort_indices(&rows, &mut local, &sorts);
        assert_eq!(offloaded, local);
        assert_eq!(offloaded, [3, 1, 4, 0, 2]);
        assert_eq!(worker.pending(), 0);
    }

    #[tokio::test]
    async fn test_out_of_bounds_is_an_error() {
        let worker = SortWorker::spawn().unwrap();
        let result = worker.sort(rows(), vec![0, 42], vec![SortSpec::asc("v")]).await;
        assert!(result.unwrap_err().contains("out of bounds"));
    }

    #[test]
    fn test_unmatched_reply_ignored() {
        let pending = Pending::new();
        let (tx, mut rx) = oneshot::channel();
        pending.insert(1, tx);

        deliver(
            &pending,
            WorkerResponse::Sorted {
                id: 7,
                indices: vec![],
                duration: Duration::ZERO,
            },
        );
        assert_eq!(pending.len(), 1);
        assert!(rx.try_recv().is_err());
    }
}
