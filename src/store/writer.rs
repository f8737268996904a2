use std::io;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};

use crate::model::StoreEvent;
use crate::observability::{LOG_FLUSH_BATCH_SIZE, LOG_FLUSH_DURATION_SECONDS};
use crate::wal::Wal;

pub(super) enum LogCommand {
    Append {
        events: Vec<StoreEvent>,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        snapshot: Vec<StoreEvent>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = (Vec<StoreEvent>, oneshot::Sender<io::Result<()>>);

/// Owns the log and group-commits appends: everything queued while one
/// flush is in progress goes out together under a single fsync.
pub(super) async fn log_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<LogCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (events, response) = match cmd {
            LogCommand::Append { events, response } => (events, response),
            other => {
                handle_other(&mut wal, other);
                continue;
            }
        };
        let mut batch: Vec<Pending> = vec![(events, response)];
        let mut deferred = None;

        loop {
            match rx.try_recv() {
                Ok(LogCommand::Append { events, response }) => batch.push((events, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(LOG_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let started = Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(LOG_FLUSH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::error!(error = %e, pending = batch.len(), "record log flush failed");
        }
        for (_, tx) in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }

        if let Some(cmd) = deferred {
            handle_other(&mut wal, cmd);
        }
    }
    tracing::debug!(path = %wal.path().display(), "record log writer stopped");
}

fn flush_batch(wal: &mut Wal, batch: &[Pending]) -> io::Result<()> {
    let mut append_err = None;
    'outer: for (events, _) in batch {
        for event in events {
            if let Err(e) = wal.append_buffered(event) {
                append_err = Some(e);
                break 'outer;
            }
        }
    }
    // Flush even after an append error so half-written bytes don't ride along
    // with the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn handle_other(wal: &mut Wal, cmd: LogCommand) {
    match cmd {
        LogCommand::Compact { snapshot, response } => {
            let _ = response.send(wal.compact(&snapshot));
        }
        LogCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        LogCommand::Append { response, .. } => {
            let _ = response.send(Err(io::Error::other("append routed to control path")));
        }
    }
}
