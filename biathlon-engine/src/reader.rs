//! Event stream reader
//!
//! Wraps any `BufRead` source and lazily yields parsed events, one per
//! non-empty line. Line numbers follow the physical input so errors can
//! point at the offending line.

use crate::event::Event;
use crate::types::Result;
use std::io::{BufRead, Lines};

/// A parsed event together with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct NumberedEvent {
    /// 1-based line number in the input
    pub line_no: usize,
    /// Raw line text (trailing whitespace removed)
    pub line: String,
    pub event: Event,
}

/// Iterator over the events of a line-oriented input
pub struct EventReader<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            lines: input.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<NumberedEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;

            let line = line.trim_end();
            if line.trim_start().is_empty() {
                continue;
            }

            let line_no = self.line_no;
            return Some(match Event::parse(line) {
                Ok(event) => Ok(NumberedEvent {
                    line_no,
                    line: line.to_string(),
                    event,
                }),
                Err(e) => Err(e.at_line(line_no, line)),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::types::ErrorCategory;

    #[test]
    fn test_reads_events_and_skips_blank_lines() {
        let input = "[09:05:59.867] 1 1\n\n   \n[09:15:00.841] 2 1 09:30:00.000\r\n";
        let events: Vec<NumberedEvent> = EventReader::new(input.as_bytes())
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].line_no, 1);
        assert_eq!(events[1].line_no, 4);
        assert_eq!(events[1].line, "[09:15:00.841] 2 1 09:30:00.000");
        assert_eq!(events[1].event.kind(), EventKind::SetStartTime);
    }

    #[test]
    fn test_malformed_line_carries_position() {
        let input = "[09:05:59.867] 1 1\n[09:15:00.841] 2\n";
        let mut reader = EventReader::new(input.as_bytes());

        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.line_no(), Some(2));
        assert_eq!(err.category(), ErrorCategory::Parse);
        assert!(reader.next().is_none());
    }
}
