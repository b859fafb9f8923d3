//! Scan executor: drives a key/value cursor document-by-document, handing
//! each one to a [`ScanConsumer`] and honoring the consumer's requested step
//! direction, including a reverse "peek" via a negative step. A small driver
//! object owning one unit of iteration and reporting back through a
//! callback, adapted here to a single-threaded, consumer-stepped model.

use crate::error::JqlError;

/// Direction the scan executor asks the cursor to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Forward,
    Backward,
}

/// The minimal KV cursor contract the executor drives. `open`/`close` are
/// owned by the executor's caller: the executor receives an already-open
/// cursor and never closes it.
pub trait KvCursor {
    /// Advance the cursor one step in `dir`. `Err(JqlError::KvCorrupted)`
    /// and other KV errors propagate to the consumer's terminal call
    /// unchanged; a cursor that has run out of documents reports that via
    /// `Ok(false)` from the wrapper below it's called through, not as an
    /// error -- `step` itself is only the raw advance primitive.
    fn step(&mut self, dir: StepDirection) -> Result<bool, JqlError>;

    /// Copy the current document id's encoded key into `buf`, returning
    /// the number of bytes written. A key is always exactly 8 bytes
    /// (`u64`, big-endian) -- anything else is `JqlError::KvCorrupted`.
    fn current_key(&self, buf: &mut [u8]) -> Result<usize, JqlError>;

    fn current_doc_id(&self) -> Result<u64, JqlError> {
        let mut buf = [0u8; 8];
        let n = self.current_key(&mut buf)?;
        if n != 8 {
            return Err(JqlError::KvCorrupted { found: n });
        }
        Ok(u64::from_be_bytes(buf))
    }
}

/// What the consumer wants the executor to do after handling one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Stop scanning; `on_finish` is called with `Ok(())`.
    Stop,
    /// Advance `n` documents in the scan's running direction; a negative
    /// `n` asks the executor to step the cursor backward instead (a
    /// reverse "peek"), without changing the scan's own direction for
    /// subsequent documents.
    Advance(i64),
}

/// Receives each scanned document and decides how the scan proceeds.
pub trait ScanConsumer {
    fn on_document(&mut self, cursor: &mut dyn KvCursor, doc_id: u64) -> Step;
    fn on_finish(&mut self, status: Result<(), JqlError>);
}

/// Drives one scan to completion. Holds no state across calls to
/// [`ScanExecutor::scan`] beyond what that single call needs.
#[derive(Debug, Clone, Copy)]
pub struct ScanExecutor {
    direction: StepDirection,
    trace: bool,
}

impl Default for ScanExecutor {
    fn default() -> Self {
        ScanExecutor::new(StepDirection::Forward, false)
    }
}

impl ScanExecutor {
    /// `direction` is the scan's natural order (`Step::Advance` with a
    /// positive magnitude steps this way); a negative magnitude steps the
    /// cursor the opposite way instead, without changing `direction` for
    /// later documents.
    pub fn new(direction: StepDirection, trace: bool) -> Self {
        ScanExecutor { direction, trace }
    }

    fn reverse(&self) -> StepDirection {
        match self.direction {
            StepDirection::Forward => StepDirection::Backward,
            StepDirection::Backward => StepDirection::Forward,
        }
    }

    /// Run the scan: step `cursor` one position at a time, accumulating a
    /// running `step` counter toward zero, and call `consumer.on_document`
    /// only once that counter reaches zero, i.e. after `|step|` cursor
    /// moves. A positive `step` advances in the scan's own `direction`; a
    /// negative one (a reverse "peek") advances in the opposite direction
    /// without otherwise disturbing `direction`. Runs until the consumer
    /// requests `Step::Stop` or the cursor is exhausted. Always calls
    /// `consumer.on_finish` exactly once, with `Ok(())` on a clean
    /// end-of-scan or consumer-requested stop, and the propagated error
    /// otherwise.
    pub fn scan(&self, cursor: &mut dyn KvCursor, consumer: &mut dyn ScanConsumer) {
        let status = self.run(cursor, consumer);
        if let Err(ref e) = status {
            log::warn!("scan terminated with error: {e}");
        }
        consumer.on_finish(status);
    }

    fn run(&self, cursor: &mut dyn KvCursor, consumer: &mut dyn ScanConsumer) -> Result<(), JqlError> {
        let mut step: i64 = 1;
        while step != 0 {
            let dir = if step > 0 { self.direction } else { self.reverse() };
            if !cursor.step(dir)? {
                if self.trace {
                    log::debug!("scan reached end of cursor");
                }
                return Ok(());
            }
            if step > 0 {
                step -= 1;
            } else {
                step += 1;
            }
            if step == 0 {
                let doc_id = cursor.current_doc_id()?;
                if self.trace {
                    log::trace!("scan visiting doc_id={doc_id}");
                }
                match consumer.on_document(cursor, doc_id) {
                    Step::Stop => return Ok(()),
                    Step::Advance(n) => step = n,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// An in-memory cursor over a fixed document id list, for exercising
    /// the executor without a real KV store.
    struct VecCursor {
        ids: Vec<u64>,
        pos: RefCell<Option<usize>>,
    }

    impl VecCursor {
        fn new(ids: Vec<u64>) -> Self {
            VecCursor {
                ids,
                pos: RefCell::new(None),
            }
        }
    }

    impl KvCursor for VecCursor {
        fn step(&mut self, dir: StepDirection) -> Result<bool, JqlError> {
            let mut pos = self.pos.borrow_mut();
            let next = match (*pos, dir) {
                (None, StepDirection::Forward) => 0,
                (None, StepDirection::Backward) => return Ok(false),
                (Some(p), StepDirection::Forward) => p + 1,
                (Some(p), StepDirection::Backward) => {
                    if p == 0 {
                        return Ok(false);
                    }
                    p - 1
                }
            };
            if next >= self.ids.len() {
                return Ok(false);
            }
            *pos = Some(next);
            Ok(true)
        }

        fn current_key(&self, buf: &mut [u8]) -> Result<usize, JqlError> {
            let pos = self.pos.borrow().expect("step before current_key");
            buf[..8].copy_from_slice(&self.ids[pos].to_be_bytes());
            Ok(8)
        }
    }

    struct CollectConsumer {
        seen: Vec<u64>,
        stop_after: Option<usize>,
        finished: Option<Result<(), JqlError>>,
    }

    impl ScanConsumer for CollectConsumer {
        fn on_document(&mut self, _cursor: &mut dyn KvCursor, doc_id: u64) -> Step {
            self.seen.push(doc_id);
            if self.stop_after == Some(self.seen.len()) {
                Step::Stop
            } else {
                Step::Advance(1)
            }
        }

        fn on_finish(&mut self, status: Result<(), JqlError>) {
            self.finished = Some(status);
        }
    }

    #[test]
    fn scans_all_documents_forward() {
        let mut cursor = VecCursor::new(vec![10, 20, 30]);
        let mut consumer = CollectConsumer {
            seen: Vec::new(),
            stop_after: None,
            finished: None,
        };
        ScanExecutor::new(StepDirection::Forward, false).scan(&mut cursor, &mut consumer);
        assert_eq!(consumer.seen, vec![10, 20, 30]);
        assert!(matches!(consumer.finished, Some(Ok(()))));
    }

    #[test]
    fn consumer_can_stop_early() {
        let mut cursor = VecCursor::new(vec![1, 2, 3, 4]);
        let mut consumer = CollectConsumer {
            seen: Vec::new(),
            stop_after: Some(2),
            finished: None,
        };
        ScanExecutor::new(StepDirection::Forward, false).scan(&mut cursor, &mut consumer);
        assert_eq!(consumer.seen, vec![1, 2]);
    }

    struct ReversePeekConsumer {
        seen: Vec<(u64, i64)>,
        peeked_once: bool,
    }

    impl ScanConsumer for ReversePeekConsumer {
        fn on_document(&mut self, _cursor: &mut dyn KvCursor, doc_id: u64) -> Step {
            self.seen.push((doc_id, 0));
            if !self.peeked_once && doc_id == 20 {
                self.peeked_once = true;
                return Step::Advance(-1);
            }
            Step::Advance(1)
        }

        fn on_finish(&mut self, _status: Result<(), JqlError>) {}
    }

    #[test]
    fn consumer_can_request_a_reverse_peek() {
        let mut cursor = VecCursor::new(vec![10, 20, 30]);
        let mut consumer = ReversePeekConsumer {
            seen: Vec::new(),
            peeked_once: false,
        };
        ScanExecutor::new(StepDirection::Forward, false).scan(&mut cursor, &mut consumer);
        // 10, 20 (peek requests reverse), 10 again, then resumes forward.
        let ids: Vec<u64> = consumer.seen.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![10, 20, 10, 20, 30]);
    }

    struct MultiStepPeekConsumer {
        seen: Vec<u64>,
        peeked_once: bool,
    }

    impl ScanConsumer for MultiStepPeekConsumer {
        fn on_document(&mut self, _cursor: &mut dyn KvCursor, doc_id: u64) -> Step {
            self.seen.push(doc_id);
            if !self.peeked_once && self.seen.len() == 3 {
                self.peeked_once = true;
                return Step::Advance(-2);
            }
            Step::Advance(1)
        }

        fn on_finish(&mut self, _status: Result<(), JqlError>) {}
    }

    #[test]
    fn reverse_peek_magnitude_moves_that_many_positions() {
        let mut cursor = VecCursor::new(vec![1, 2, 3, 4, 5]);
        let mut consumer = MultiStepPeekConsumer {
            seen: Vec::new(),
            peeked_once: false,
        };
        ScanExecutor::new(StepDirection::Forward, false).scan(&mut cursor, &mut consumer);
        // 1, 2, 3 (peek -2 requests two steps back), 1, then resumes forward.
        assert_eq!(consumer.seen, vec![1, 2, 3, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn base_direction_backward_scans_in_reverse() {
        let mut cursor = VecCursor::new(vec![10, 20, 30]);
        cursor.pos = RefCell::new(Some(2));
        let mut consumer = CollectConsumer {
            seen: Vec::new(),
            stop_after: None,
            finished: None,
        };
        ScanExecutor::new(StepDirection::Backward, false).scan(&mut cursor, &mut consumer);
        assert_eq!(consumer.seen, vec![20, 10]);
    }
}
