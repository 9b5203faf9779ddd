//! Rewrites applied to every event of the upstream feed.
//!
//! Each patch looks at one event and may replace its `SUMMARY` and
//! `DESCRIPTION`. Patches never add or remove events and never touch
//! structural properties, so a valid feed stays valid.

use std::sync::LazyLock;

use icalendar::{Component, Event};
use regex::Regex;

/// Title of the introductory course whose free tutorials get marked
pub const COURSE_MARKER: &str = "Einführung in die Informatik";
/// Description phrase the upstream uses for free tutorial sessions
pub const TUTORIAL_MARKER: &str = "Freies Tutorium";
/// Appended to the title of a tutorial session
pub const TUTORIAL_SUFFIX: &str = " Tutorium";

// ETI.1.0230.0.V.4 Einführung in die Informatik
static COURSE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ETI\.\d+\.\d+\.\d+\.V\.\d+\s+(.+)$").expect("course code pattern is valid")
});

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("html tag pattern is valid"));

/// A single rewrite of an event's text fields.
pub trait Patch {
    /// Short identifier used in log output
    fn name(&self) -> &'static str;

    fn apply(&self, event: &mut Event);
}

/// Drops the course-code prefix the upstream puts in front of every title.
pub struct StripCourseCode;

impl Patch for StripCourseCode {
    fn name(&self) -> &'static str {
        "strip-course-code"
    }

    fn apply(&self, event: &mut Event) {
        let Some(title) = event.get_summary() else {
            return;
        };

        if let Some(stripped) = strip_course_code(title).map(str::to_string) {
            event.summary(&stripped);
        }
    }
}

/// Returns the title without its course-code prefix, or `None` if the title
/// does not start with one.
pub fn strip_course_code(title: &str) -> Option<&str> {
    COURSE_CODE
        .captures(title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Marks free tutorial sessions of the introductory course and cleans up
/// their descriptions.
///
/// Must run after [`StripCourseCode`].
pub struct MarkTutorial;

impl Patch for MarkTutorial {
    fn name(&self) -> &'static str {
        "mark-tutorial"
    }

    fn apply(&self, event: &mut Event) {
        let title = event.get_summary().unwrap_or_default();
        let description = event.get_description().unwrap_or_default();

        if let Some((title, description)) = mark_tutorial(title, description) {
            event.summary(&title);
            event.description(&description);
        }
    }
}

/// Computes the new `(title, description)` for a tutorial session, or `None`
/// if the event is not one (or has already been marked).
pub fn mark_tutorial(title: &str, description: &str) -> Option<(String, String)> {
    if !title.contains(COURSE_MARKER) || !description.contains(TUTORIAL_MARKER) {
        return None;
    }
    // Already marked. The marker phrase has no lowercase l, so a patched event
    // still matches. Upstream titles that end in " Tutorium" on their own are
    // skipped too and keep their raw description.
    if title.ends_with(TUTORIAL_SUFFIX) {
        return None;
    }

    let description = HTML_TAG
        .replace_all(description, "")
        .replace("&nbsp;", "")
        // upstream renders capital I as lowercase l; real l's get replaced too
        .replace('l', "I");

    Some((format!("{title}{TUTORIAL_SUFFIX}"), description))
}

/// Ordered list of patches applied to every event.
pub struct Pipeline {
    patches: Vec<Box<dyn Patch + Send + Sync>>,
}

impl Pipeline {
    pub fn new(patches: Vec<Box<dyn Patch + Send + Sync>>) -> Self {
        Pipeline { patches }
    }

    /// The fixed set of rewrites for the upstream feed.
    pub fn standard() -> Self {
        let patches: Vec<Box<dyn Patch + Send + Sync>> =
            vec![Box::new(StripCourseCode), Box::new(MarkTutorial)];
        Pipeline::new(patches)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.patches.iter().map(|p| p.name()).collect()
    }

    pub fn apply(&self, event: &mut Event) {
        for patch in &self.patches {
            patch.apply(event);
        }
    }
}
