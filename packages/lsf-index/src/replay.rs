//! Time-driven replay of several message types at once.
//!
//! A replay owns one cursor per requested type. Playback moves a shared
//! clock forward with [`LogReplay::advance_to`], which hands back every
//! message that became due, merged across the types in timestamp order.

use crate::cursor::LogCursor;
use crate::error::Result;
use crate::message::LogMessage;
use crate::source::LogSource;

pub struct LogReplay {
    cursors: Vec<LogCursor>,
    start_time: Option<f64>,
    end_time: Option<f64>,
    /// `None` until the clock first moves: nothing delivered yet.
    current: Option<f64>,
}

impl LogReplay {
    /// Replay of `types`. Types absent from the log are left out.
    pub fn new(source: &LogSource, types: &[&str]) -> Self {
        let cursors: Vec<LogCursor> = types
            .iter()
            .filter_map(|name| source.get_log(name))
            .map(|view| view.cursor())
            .collect();

        let index = source.index();
        let start_time = cursors
            .iter()
            .filter_map(|c| index.first_of_type(c.type_id()))
            .filter_map(|r| index.time_of(r))
            .min_by(f64::total_cmp);
        let end_time = cursors
            .iter()
            .filter_map(|c| index.last_of_type(c.type_id()))
            .filter_map(|r| index.time_of(r))
            .max_by(f64::total_cmp);

        Self {
            cursors,
            start_time,
            end_time,
            current: None,
        }
    }

    /// Number of types being replayed.
    pub fn type_count(&self) -> usize {
        self.cursors.len()
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    /// Time up to which messages have been delivered.
    pub fn current_time(&self) -> Option<f64> {
        self.current
    }

    /// Move the clock to `t` without delivering anything. The next
    /// `advance_to` delivers messages after `t`.
    pub fn seek(&mut self, t: f64) {
        for cursor in &mut self.cursors {
            cursor.seek_to_time(t);
        }
        self.current = Some(t);
    }

    /// Messages with `current_time() < timestamp <= t`, in timestamp order
    /// (file order among equal timestamps). Moving backwards is a seek.
    ///
    /// Records whose payload does not decode are skipped with a warning. Any
    /// other error leaves the replay where it was, so the same call can be
    /// retried without losing messages.
    pub fn advance_to(&mut self, t: f64) -> Result<Vec<LogMessage>> {
        if self.current.is_some_and(|c| t < c) {
            self.seek(t);
            return Ok(Vec::new());
        }

        let positions: Vec<usize> = self.cursors.iter().map(LogCursor::position).collect();
        match self.collect_due(t) {
            Ok(mut due) => {
                due.sort_by(|(ra, a), (rb, b)| {
                    a.timestamp()
                        .total_cmp(&b.timestamp())
                        .then(ra.cmp(rb))
                });
                self.current = Some(t);
                Ok(due.into_iter().map(|(_, msg)| msg).collect())
            }
            Err(e) => {
                for (cursor, &pos) in self.cursors.iter_mut().zip(&positions) {
                    cursor.reset();
                    cursor.advance(pos);
                }
                Err(e)
            }
        }
    }

    fn collect_due(&mut self, t: f64) -> Result<Vec<(usize, LogMessage)>> {
        let current = self.current;
        let mut due = Vec::new();
        for cursor in &mut self.cursors {
            while let (Some(record), Some(ts)) = (cursor.peek_record_index(), cursor.peek_time()) {
                if ts > t {
                    break;
                }
                if current.is_some_and(|c| ts <= c) {
                    cursor.advance(1);
                    continue;
                }
                match cursor.next_message() {
                    Some(Ok(msg)) => due.push((record, msg)),
                    Some(Err(e)) if e.is_record_local() => {
                        tracing::warn!("replay skipping record {}: {}", record, e);
                    }
                    Some(Err(e)) => return Err(e),
                    None => break,
                }
            }
        }
        Ok(due)
    }
}
