use std::{io, iter::FusedIterator};

pub fn would_block(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
}

pub fn interrupted(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Interrupted
}

/// Iterator that repeats a nonblocking operation until it reports
/// [`WouldBlock`](io::ErrorKind::WouldBlock).
///
/// An edge-triggered descriptor is only notified again after it left the
/// ready state, so every notification has to be consumed with one of these.
///
/// * `Ok(value)` yields `Some(Ok(value))` and the operation is called again on the next `next()`.
/// * `WouldBlock` ends the iteration.
/// * `Interrupted` retries immediately.
/// * Any other error yields `Some(Err(err))` once, then the iteration ends.
pub struct Drain<F> {
    op: F,
    done: bool,
}

/// Create a [`Drain`] over nonblocking operation `op`.
pub fn drain<F, T>(op: F) -> Drain<F>
where
    F: FnMut() -> io::Result<T>,
{
    Drain { op, done: false }
}

impl<F, T> Iterator for Drain<F>
where
    F: FnMut() -> io::Result<T>,
{
    type Item = io::Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            match (self.op)() {
                Ok(value) => return Some(Ok(value)),
                Err(ref err) if interrupted(err) => continue,
                Err(ref err) if would_block(err) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<F, T> FusedIterator for Drain<F> where F: FnMut() -> io::Result<T> {}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, collections::VecDeque, io, rc::Rc};

    use super::drain;

    fn scripted(results: Vec<io::Result<u32>>) -> (impl FnMut() -> io::Result<u32>, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut results = VecDeque::from(results);

        let op = move || {
            counter.set(counter.get() + 1);
            results
                .pop_front()
                .unwrap_or_else(|| Err(io::ErrorKind::WouldBlock.into()))
        };

        (op, calls)
    }

    #[test]
    fn test_drain_until_would_block() {
        let (op, calls) = scripted(vec![Ok(1), Ok(2), Ok(3)]);

        let values = drain(op).collect::<io::Result<Vec<_>>>().unwrap();

        assert_eq!(values, vec![1, 2, 3]);
        // the fourth call observed would block.
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_drain_retries_interrupted() {
        let (op, calls) = scripted(vec![
            Ok(1),
            Err(io::ErrorKind::Interrupted.into()),
            Ok(2),
        ]);

        let values = drain(op).collect::<io::Result<Vec<_>>>().unwrap();

        assert_eq!(values, vec![1, 2]);
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_drain_stops_after_error() {
        let (op, calls) = scripted(vec![
            Ok(1),
            Err(io::ErrorKind::ConnectionReset.into()),
            Ok(2),
        ]);

        let mut iter = drain(op);

        assert_eq!(iter.next().unwrap().unwrap(), 1);
        assert_eq!(
            iter.next().unwrap().unwrap_err().kind(),
            io::ErrorKind::ConnectionReset
        );
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());

        assert_eq!(calls.get(), 2);
    }
}
