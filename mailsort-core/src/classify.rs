//! Category-to-folder mapping and the steps that apply it.
//!
//! Each category label maps to a destination folder name. Categories that
//! stay in place only receive the folder name as a tag; the others are
//! moved into the folder and then tagged. Moving first means a failed tag
//! leaves the message filed correctly but untagged.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{Error, Result};

/// Where a category sends a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Destination {
    /// Destination folder name, also the tag text.
    pub folder: &'static str,
    pub stays_in_place: bool,
}

impl Destination {
    /// Tag only; the message stays where it is.
    pub const fn tag(folder: &'static str) -> Self {
        Self {
            folder,
            stays_in_place: true,
        }
    }

    /// Move into `folder`, then tag.
    pub const fn relocate(folder: &'static str) -> Self {
        Self {
            folder,
            stays_in_place: false,
        }
    }

    /// External writes, in order.
    pub fn steps(&self) -> &'static [Step] {
        if self.stays_in_place {
            &[Step::Tag]
        } else {
            &[Step::Move, Step::Tag]
        }
    }
}

/// One external write performed when applying a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Move,
    Tag,
}

const BUILTIN: &[(&str, Destination)] = &[
    ("required_personal_action", Destination::tag("Work Relevant")),
    ("team_action", Destination::tag("Work Relevant")),
    ("optional_action", Destination::tag("Work Relevant")),
    ("work_relevant", Destination::tag("Work Relevant")),
    ("fyi", Destination::relocate("FYI")),
    ("newsletter", Destination::relocate("Newsletters")),
    ("job_listing", Destination::relocate("Job Listings")),
    ("optional_event", Destination::relocate("Optional Events")),
    ("spam_to_delete", Destination::relocate("Spam")),
];

/// Static category table.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationMapping {
    entries: &'static [(&'static str, Destination)],
}

impl Default for ClassificationMapping {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ClassificationMapping {
    /// The table compiled into the binary.
    pub const fn builtin() -> Self {
        Self { entries: BUILTIN }
    }

    /// A table with every label mapped exactly once.
    pub fn new(entries: &'static [(&'static str, Destination)]) -> Result<Self> {
        let mut seen = HashSet::new();
        for (label, _) in entries {
            if !seen.insert(*label) {
                return Err(Error::Config(format!(
                    "category '{label}' is mapped more than once"
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn lookup(&self, label: &str) -> Option<Destination> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, destination)| *destination)
    }

    /// Destination for `label`; unknown labels are an error for message `id`.
    pub fn resolve(&self, id: &str, label: &str) -> Result<Destination> {
        self.lookup(label).ok_or_else(|| Error::UnknownCategory {
            id: id.to_string(),
            label: label.to_string(),
        })
    }

    pub fn entries(&self) -> &'static [(&'static str, Destination)] {
        self.entries
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> {
        self.entries.iter().map(|(label, _)| *label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_maps_each_label_once() {
        let builtin = ClassificationMapping::builtin();
        assert!(ClassificationMapping::new(builtin.entries()).is_ok());
        assert_eq!(builtin.labels().count(), BUILTIN.len());
    }

    #[test]
    fn test_builtin_partitions() {
        let builtin = ClassificationMapping::builtin();
        assert_eq!(
            builtin.lookup("required_personal_action"),
            Some(Destination::tag("Work Relevant"))
        );
        assert_eq!(
            builtin.lookup("spam_to_delete"),
            Some(Destination::relocate("Spam"))
        );
        let stays = builtin
            .entries()
            .iter()
            .filter(|(_, d)| d.stays_in_place)
            .count();
        assert_eq!(stays, 4);
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        static DUPLICATED: &[(&str, Destination)] = &[
            ("fyi", Destination::relocate("FYI")),
            ("fyi", Destination::tag("Inbox")),
        ];
        assert!(matches!(
            ClassificationMapping::new(DUPLICATED),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_unknown_label() {
        let err = ClassificationMapping::builtin()
            .resolve("msg-9", "bogus")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownCategory { ref id, ref label } if id == "msg-9" && label == "bogus"
        ));
    }

    #[test]
    fn test_steps_move_before_tag() {
        assert_eq!(Destination::tag("Work Relevant").steps(), &[Step::Tag]);
        assert_eq!(
            Destination::relocate("Spam").steps(),
            &[Step::Move, Step::Tag]
        );
    }
}
