//! Feed rewriting: validate with the icalendar parser, then patch events in
//! place at the content-line level.

use icalendar::{Calendar, Component, Event};
use tracing::debug;

use crate::error::{IcsError, IcsResult};
use crate::ics::lines::{ContentLine, content_lines, unescape_text, write_property};
use crate::patch::Pipeline;

const CALENDAR_BEGIN: &str = "BEGIN:VCALENDAR";

/// Rewrite a raw upstream feed and return the serialized result.
///
/// Only `SUMMARY` and `DESCRIPTION` lines of events that a patch actually
/// changed are re-encoded; every other line is copied through unchanged.
pub fn modify_ics(content: &[u8], pipeline: &Pipeline) -> IcsResult<Vec<u8>> {
    let text = std::str::from_utf8(content)
        .map_err(|e| IcsError::Parse(format!("feed is not valid UTF-8: {e}")))?;

    parse_calendar(text)?;

    let mut out = String::with_capacity(text.len());
    let mut event: Option<EventLines<'_>> = None;
    let mut events = 0;

    for line in content_lines(text) {
        if event.is_none() {
            if line.begins("VEVENT") {
                event = Some(EventLines {
                    lines: vec![line],
                    depth: 1,
                });
            } else {
                out.push_str(line.raw);
            }
            continue;
        }

        let Some(current) = event.as_mut() else {
            continue;
        };
        if line.is_begin() {
            current.depth += 1;
        } else if line.is_end() {
            current.depth = current.depth.saturating_sub(1);
        }
        let closed = current.depth == 0;
        current.lines.push(line);

        if closed {
            if let Some(finished) = event.take() {
                finished.write_patched(&mut out, pipeline);
                events += 1;
            }
        }
    }

    // the parser accepted the feed, so this only happens for a missing END:VEVENT
    if let Some(unfinished) = event {
        return Err(IcsError::Serialize(format!(
            "unterminated VEVENT ({} lines)",
            unfinished.lines.len()
        )));
    }

    debug!(events, "Applied patch pipeline");
    Ok(out.into_bytes())
}

/// Parse ICS text into a calendar document.
///
/// The text has to start with a `VCALENDAR` component; anything else is
/// rejected rather than parsed into an empty calendar.
pub fn parse_calendar(text: &str) -> IcsResult<Calendar> {
    let head = text.trim_start_matches('\u{feff}').trim_start();
    let starts_with_calendar = head
        .get(..CALENDAR_BEGIN.len())
        .is_some_and(|h| h.eq_ignore_ascii_case(CALENDAR_BEGIN));
    if !starts_with_calendar {
        return Err(IcsError::Parse(format!("expected {CALENDAR_BEGIN}")));
    }

    head.parse::<Calendar>()
        .map_err(|e| IcsError::Parse(e.to_string()))
}

/// Content lines of one VEVENT, from `BEGIN:VEVENT` to `END:VEVENT`.
struct EventLines<'a> {
    lines: Vec<ContentLine<'a>>,
    depth: usize,
}

impl EventLines<'_> {
    /// Index of the first `name` property of the event itself (not of a
    /// nested VALARM).
    fn own_property(&self, name: &str) -> Option<usize> {
        let mut depth = 0usize;
        for (i, line) in self.lines.iter().enumerate() {
            if line.is_begin() {
                depth += 1;
            } else if line.is_end() {
                depth = depth.saturating_sub(1);
            } else if depth == 1 && line.name() == name {
                return Some(i);
            }
        }
        None
    }

    fn text_of(&self, index: Option<usize>) -> Option<String> {
        index.map(|i| unescape_text(self.lines[i].value()))
    }

    fn write_patched(&self, out: &mut String, pipeline: &Pipeline) {
        let summary_at = self.own_property("SUMMARY");
        let description_at = self.own_property("DESCRIPTION");
        let summary = self.text_of(summary_at);
        let description = self.text_of(description_at);

        let mut event = Event::new();
        if let Some(summary) = &summary {
            event.summary(summary);
        }
        if let Some(description) = &description {
            event.description(description);
        }
        pipeline.apply(&mut event);

        let replacements = [
            ("SUMMARY", summary_at, summary, event.get_summary()),
            ("DESCRIPTION", description_at, description, event.get_description()),
        ];
        let last = self.lines.len().saturating_sub(1);

        for (i, line) in self.lines.iter().enumerate() {
            if i == last {
                // properties a patch added go right before END:VEVENT
                for (name, at, _, patched) in &replacements {
                    if let (None, Some(value)) = (at, patched) {
                        write_property(out, name, value, line_break(line));
                    }
                }
            }

            let replaced = replacements
                .iter()
                .find(|(_, at, before, patched)| *at == Some(i) && before.as_deref() != *patched);
            match replaced {
                Some((_, _, _, Some(value))) => {
                    write_property(out, line.head(), value, line.terminator())
                }
                Some((_, _, _, None)) => {}
                None => out.push_str(line.raw),
            }
        }
    }
}

// Terminator for an inserted line, which never ends the input
fn line_break(line: &ContentLine<'_>) -> &'static str {
    if line.raw.contains("\r\n") || line.terminator().is_empty() {
        "\r\n"
    } else {
        "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icalendar::CalendarComponent;

    fn reparse(output: &[u8]) -> Calendar {
        parse_calendar(std::str::from_utf8(output).unwrap()).expect("output should parse")
    }

    fn events(calendar: &Calendar) -> Vec<&Event> {
        calendar
            .components
            .iter()
            .filter_map(|c| match c {
                CalendarComponent::Event(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Unfolded lines, without `SUMMARY`/`DESCRIPTION` of events
    fn structural_lines(text: &str) -> Vec<String> {
        let mut in_alarm = false;
        content_lines(text)
            .into_iter()
            .map(|l| l.unfolded)
            .filter(|l| {
                if l.as_str() == "BEGIN:VALARM" {
                    in_alarm = true;
                } else if l.as_str() == "END:VALARM" {
                    in_alarm = false;
                }
                in_alarm || !(l.starts_with("SUMMARY") || l.starts_with("DESCRIPTION"))
            })
            .collect()
    }

    const TUTORIAL_FEED: &str = "BEGIN:VCALENDAR
VERSION:2.0
PRODID:-//Upstream//Stundenplan//DE
BEGIN:VEVENT
UID:tutorium-1@upstream
DTSTAMP:20240401T080000Z
DTSTART:20240415T120000Z
DTEND:20240415T140000Z
SUMMARY:ETI.1.0230.0.V.4 Einführung in die Informatik
DESCRIPTION:<p>Freies Tutorium</p>&nbsp;<b>Hilfe</b> im Hörsaal&nbsp;
END:VEVENT
BEGIN:VEVENT
UID:mensa-1@upstream
DTSTAMP:20240401T080000Z
DTSTART:20240415T110000Z
DTEND:20240415T120000Z
SUMMARY:Mensa
DESCRIPTION:Mittagessen mit allen
END:VEVENT
END:VCALENDAR
";

    // timezones, recurrence, alarms, folding, escapes and an event without UID
    const VENDOR_FEED: &str = "BEGIN:VCALENDAR
VERSION:2.0
PRODID:-//Upstream//Stundenplan//DE
X-WR-CALNAME:Stundenplan
BEGIN:VTIMEZONE
TZID:Europe/Berlin
BEGIN:DAYLIGHT
TZOFFSETFROM:+0100
TZOFFSETTO:+0200
TZNAME:CEST
DTSTART:19700329T020000
RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU
END:DAYLIGHT
BEGIN:STANDARD
TZOFFSETFROM:+0200
TZOFFSETTO:+0100
TZNAME:CET
DTSTART:19701025T030000
RRULE:FREQ=YEARLY;BYMONTH=10;BYDAY=-1SU
END:STANDARD
END:VTIMEZONE
BEGIN:VEVENT
UID:tutorium-7@upstream
DTSTAMP:20240401T080000Z
DTSTART;TZID=Europe/Berlin:20240415T140000
DTEND;TZID=Europe/Berlin:20240415T160000
RRULE:FREQ=WEEKLY;COUNT=12
EXDATE;TZID=Europe/Berlin:20240429T140000
SUMMARY:ETI.1.0230.0.V.4 Einführung in die Informatik
DESCRIPTION:<p>Freies Tutorium</p>&nbsp\\;<b>Hilfe</b> zu Blatt 3\\, bitte Laptop
  mitbringen</p>
LOCATION:Raum 042\\, Geb. 5
BEGIN:VALARM
ACTION:DISPLAY
TRIGGER:-PT15M
DESCRIPTION:Freies Tutorium Einführung in die Informatik
END:VALARM
END:VEVENT
BEGIN:VEVENT
DTSTAMP:20240401T080000Z
DTSTART;TZID=Europe/Berlin:20240416T100000
DTEND;TZID=Europe/Berlin:20240416T120000
SUMMARY:ETI.1.0231.0.V.2 Lineare Algebra
END:VEVENT
END:VCALENDAR
";

    fn crlf(feed: &str) -> String {
        feed.replace('\n', "\r\n")
    }

    #[test]
    fn test_modify_ics_marks_tutorial_session() {
        let output = modify_ics(TUTORIAL_FEED.as_bytes(), &Pipeline::standard()).unwrap();
        let calendar = reparse(&output);
        let events = events(&calendar);

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].get_summary(),
            Some("Einführung in die Informatik Tutorium")
        );
        assert_eq!(
            events[0].get_description(),
            Some("Freies TutoriumHiIfe im HörsaaI")
        );
    }

    #[test]
    fn test_modify_ics_leaves_unrelated_event_untouched() {
        let output = modify_ics(TUTORIAL_FEED.as_bytes(), &Pipeline::standard()).unwrap();
        let calendar = reparse(&output);
        let events = events(&calendar);

        assert_eq!(events[1].get_summary(), Some("Mensa"));
        assert_eq!(events[1].get_description(), Some("Mittagessen mit allen"));
        assert_eq!(events[1].get_uid(), Some("mensa-1@upstream"));
    }

    #[test]
    fn test_modify_ics_keeps_structure_of_vendor_feed() {
        let feed = crlf(VENDOR_FEED);
        let output = modify_ics(feed.as_bytes(), &Pipeline::standard()).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert_eq!(structural_lines(&output), structural_lines(&feed));
        assert_eq!(output.matches("UID:").count(), 1);
        assert_eq!(output.matches("DTSTAMP:").count(), 2);
        assert!(output.contains("DESCRIPTION:Freies Tutorium Einführung in die Informatik\r\n"));
    }

    #[test]
    fn test_modify_ics_rewrites_only_patched_lines() {
        let feed = crlf(VENDOR_FEED);
        let output = modify_ics(feed.as_bytes(), &Pipeline::standard()).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.contains("\r\nSUMMARY:Einführung in die Informatik Tutorium\r\n"));
        assert!(output.contains(
            "\r\nDESCRIPTION:Freies TutoriumHiIfe zu BIatt 3\\, bitte Laptop mitbringen\r\n"
        ));
        assert!(output.contains("\r\nSUMMARY:Lineare Algebra\r\n"));
        assert!(!output.contains("ETI."));
    }

    #[test]
    fn test_modify_ics_is_deterministic() {
        let feed = crlf(VENDOR_FEED);
        let pipeline = Pipeline::standard();

        let first = modify_ics(feed.as_bytes(), &pipeline).unwrap();
        let second = modify_ics(feed.as_bytes(), &pipeline).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_modify_ics_without_matches_is_byte_identical() {
        let feed = crlf(
            "BEGIN:VCALENDAR
VERSION:2.0
PRODID:-//Upstream//Stundenplan//DE
BEGIN:VEVENT
DTSTART:20240415T110000Z
SUMMARY:Mensa
DESCRIPTION:<b>Mittagessen</b>&nbsp\\;mit allen
BEGIN:VALARM
ACTION:DISPLAY
TRIGGER:-PT5M
END:VALARM
END:VEVENT
END:VCALENDAR
",
        );

        let output = modify_ics(feed.as_bytes(), &Pipeline::standard()).unwrap();
        assert_eq!(output, feed.into_bytes());
    }

    #[test]
    fn test_modify_ics_twice_does_not_double_append() {
        let pipeline = Pipeline::standard();
        let once = modify_ics(crlf(VENDOR_FEED).as_bytes(), &pipeline).unwrap();
        let twice = modify_ics(&once, &pipeline).unwrap();

        assert_eq!(once, twice);
        let calendar = reparse(&twice);
        assert_eq!(
            events(&calendar)[0].get_summary(),
            Some("Einführung in die Informatik Tutorium")
        );
    }

    #[test]
    fn test_modify_ics_empty_calendar_roundtrip() {
        let feed = "BEGIN:VCALENDAR
VERSION:2.0
PRODID:-//Upstream//Stundenplan//DE
END:VCALENDAR
";
        let output = modify_ics(feed.as_bytes(), &Pipeline::standard()).unwrap();

        assert_eq!(output, feed.as_bytes());
        assert!(events(&reparse(&output)).is_empty());
    }

    #[test]
    fn test_modify_ics_passes_other_components_through() {
        let feed = "BEGIN:VCALENDAR
VERSION:2.0
PRODID:-//Upstream//Stundenplan//DE
BEGIN:VTODO
UID:todo-1@upstream
DTSTAMP:20240401T080000Z
SUMMARY:ETI.1.0230.0.V.4 Einführung in die Informatik
END:VTODO
END:VCALENDAR
";
        let output = modify_ics(feed.as_bytes(), &Pipeline::standard()).unwrap();
        assert_eq!(output, feed.as_bytes());
    }

    #[test]
    fn test_modify_ics_rejects_non_calendar_input() {
        let err = modify_ics(b"<html><body>Wartungsarbeiten</body></html>", &Pipeline::standard())
            .unwrap_err();
        assert!(matches!(err, IcsError::Parse(_)));
    }

    #[test]
    fn test_modify_ics_rejects_invalid_utf8() {
        let err = modify_ics(&[0x42, 0xff, 0xfe, 0x00], &Pipeline::standard()).unwrap_err();
        assert!(matches!(err, IcsError::Parse(_)));
    }
}
