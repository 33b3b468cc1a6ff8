//! Async adapter over a blocking `Query`.
//!
//! The engine blocks while it computes the next event, so the query runs on a
//! `spawn_blocking` worker. The worker pulls exactly one row per poll demand;
//! no solutions are computed ahead of the consumer. Dropping the stream closes
//! the demand channel, the worker returns and the query is released.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use hostbridge_core::{BridgeError, Result};
use tokio::sync::mpsc;
use tracing::trace;

use crate::query::{Query, ResultRow};

pub struct QueryStream {
    demand: mpsc::UnboundedSender<()>,
    rows: mpsc::Receiver<Result<ResultRow>>,
    pending: bool,
}

impl Query {
    /// Run this query on the blocking pool. Requires a tokio runtime.
    pub fn into_stream(self) -> Result<QueryStream> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| BridgeError::Engine(format!("no async runtime: {e}")))?;
        let (demand_tx, mut demand_rx) = mpsc::unbounded_channel::<()>();
        let (rows_tx, rows_rx) = mpsc::channel::<Result<ResultRow>>(1);

        handle.spawn_blocking(move || {
            let mut query = self;
            while demand_rx.blocking_recv().is_some() {
                match query.next_result() {
                    Some(row) => {
                        if rows_tx.blocking_send(row).is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            trace!("query stream worker finished");
        });

        Ok(QueryStream {
            demand: demand_tx,
            rows: rows_rx,
            pending: false,
        })
    }
}

impl Stream for QueryStream {
    type Item = Result<ResultRow>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if !self.pending {
            // A closed demand channel means the worker is gone; the receiver
            // below then yields `None`.
            let _ = self.demand.send(());
            self.pending = true;
        }
        match self.rows.poll_recv(cx) {
            Poll::Ready(item) => {
                self.pending = false;
                Poll::Ready(item)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
