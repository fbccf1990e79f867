//! Bounded multi-producer/multi-consumer queue for edge-pair batches.
//!
//! The driver pushes batches, workers drain a few items at a time. After
//! `close()` receivers drain whatever is left and then read 0, which is the
//! workers' exit signal.

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, Sender};

pub struct WorkQueue<T> {
    tx: Option<Sender<T>>,
}

/// Worker-side handle. Cloning is cheap; every worker gets its own.
pub struct QueueReceiver<T>(Receiver<T>);

impl<T> Clone for QueueReceiver<T> {
    fn clone(&self) -> Self {
        QueueReceiver(self.0.clone())
    }
}

impl<T> WorkQueue<T> {
    /// Queue holding at most `capacity` items; `send` blocks beyond that.
    pub fn bounded(capacity: usize) -> (Self, QueueReceiver<T>) {
        let (tx, rx) = bounded(capacity);
        (WorkQueue { tx: Some(tx) }, QueueReceiver(rx))
    }

    /// Enqueue a batch, blocking while the queue is full. Fails only when
    /// every receiver is gone, i.e. all workers stopped early.
    pub fn send(&self, batch: Vec<T>) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| anyhow!("send on closed work queue"))?;
        for item in batch {
            tx.send(item)
                .map_err(|_| anyhow!("work queue receivers are gone"))?;
        }
        Ok(())
    }

    /// No further sends; receivers drain the rest and then read 0.
    pub fn close(&mut self) {
        self.tx = None;
    }
}

impl<T> QueueReceiver<T> {
    /// Dequeue up to `max` items into `buf`. Blocks while the queue is empty
    /// and open; returns 0 once it is closed and drained.
    pub fn receive_some(&self, buf: &mut Vec<T>, max: usize) -> usize {
        match self.0.recv() {
            Ok(item) => {
                buf.push(item);
                while buf.len() < max {
                    match self.0.try_recv() {
                        Ok(item) => buf.push(item),
                        Err(_) => break,
                    }
                }
                buf.len()
            }
            Err(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn drains_in_bounded_chunks() {
        let (queue, rx) = WorkQueue::bounded(64);
        queue.send((0..10).collect()).unwrap();
        let mut buf = Vec::new();
        let got = rx.receive_some(&mut buf, 4);
        assert_eq!(got, 4);
        assert_eq!(buf, vec![0, 1, 2, 3]);
    }

    #[test]
    fn close_then_drain_then_zero() {
        let (mut queue, rx) = WorkQueue::bounded(8);
        queue.send(vec![1, 2]).unwrap();
        queue.close();
        let mut buf = Vec::new();
        assert_eq!(rx.receive_some(&mut buf, 20), 2);
        buf.clear();
        assert_eq!(rx.receive_some(&mut buf, 20), 0);
    }

    #[test]
    fn consumers_split_the_work() {
        let (mut queue, rx) = WorkQueue::bounded(4);
        let workers: Vec<_> = (0..3)
            .map(|_| {
                let rx = rx.clone();
                thread::spawn(move || {
                    let mut seen = 0usize;
                    let mut buf = Vec::new();
                    loop {
                        buf.clear();
                        let got = rx.receive_some(&mut buf, 5);
                        if got == 0 {
                            return seen;
                        }
                        seen += got;
                    }
                })
            })
            .collect();
        drop(rx);

        queue.send((0..100).collect()).unwrap();
        queue.close();
        let total: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn send_fails_when_all_receivers_are_gone() {
        let (queue, rx) = WorkQueue::bounded(1);
        drop(rx);
        assert!(queue.send(vec![1]).is_err());
    }
}
