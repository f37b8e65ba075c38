//! Flow states and their payloads

use crate::i18n::Lang;
use crate::runtime::identity::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Complaint and proposal flows share one implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Complaint,
    Proposal,
}

impl FeedbackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackKind::Complaint => "complaint",
            FeedbackKind::Proposal => "proposal",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "complaint" => Some(FeedbackKind::Complaint),
            "proposal" => Some(FeedbackKind::Proposal),
            _ => None,
        }
    }
}

/// Current step of a multi-step flow, with the fields that step owns.
///
/// Serialized with an internal `state` tag; the tag doubles as the
/// persisted state name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowState {
    // Registration
    AwaitingLanguage,
    AwaitingPhone {
        language: Lang,
    },
    AwaitingFullName {
        language: Lang,
        phone: String,
    },
    AwaitingChildName {
        language: Lang,
        phone: String,
        full_name: String,
    },
    AwaitingChildClass {
        language: Lang,
        phone: String,
        full_name: String,
        child_name: String,
    },

    // Complaints and proposals
    AwaitingComplaintText,
    ConfirmingComplaint {
        draft: String,
    },
    AwaitingProposalText,
    ConfirmingProposal {
        draft: String,
    },

    // Administration
    AwaitingClassName,
    AwaitingTeacherPhone,
    AwaitingTeacherName {
        phone: String,
    },
    AwaitingTeacherClasses {
        phone: String,
        full_name: String,
        #[serde(default)]
        class_ids: BTreeSet<i64>,
    },
    AwaitingTimetable {
        class_id: i64,
    },
    AwaitingAnnouncementText,
    ConfirmingAnnouncement {
        text: String,
    },

    // Teaching
    MarkingAttendance {
        class_id: i64,
        #[serde(default)]
        absent: BTreeSet<i64>,
    },
    AwaitingGrade {
        class_id: i64,
        student_id: i64,
    },
}

impl FlowState {
    pub fn name(&self) -> StateName {
        match self {
            FlowState::AwaitingLanguage => StateName::AwaitingLanguage,
            FlowState::AwaitingPhone { .. } => StateName::AwaitingPhone,
            FlowState::AwaitingFullName { .. } => StateName::AwaitingFullName,
            FlowState::AwaitingChildName { .. } => StateName::AwaitingChildName,
            FlowState::AwaitingChildClass { .. } => StateName::AwaitingChildClass,
            FlowState::AwaitingComplaintText => StateName::AwaitingComplaintText,
            FlowState::ConfirmingComplaint { .. } => StateName::ConfirmingComplaint,
            FlowState::AwaitingProposalText => StateName::AwaitingProposalText,
            FlowState::ConfirmingProposal { .. } => StateName::ConfirmingProposal,
            FlowState::AwaitingClassName => StateName::AwaitingClassName,
            FlowState::AwaitingTeacherPhone => StateName::AwaitingTeacherPhone,
            FlowState::AwaitingTeacherName { .. } => StateName::AwaitingTeacherName,
            FlowState::AwaitingTeacherClasses { .. } => StateName::AwaitingTeacherClasses,
            FlowState::AwaitingTimetable { .. } => StateName::AwaitingTimetable,
            FlowState::AwaitingAnnouncementText => StateName::AwaitingAnnouncementText,
            FlowState::ConfirmingAnnouncement { .. } => StateName::ConfirmingAnnouncement,
            FlowState::MarkingAttendance { .. } => StateName::MarkingAttendance,
            FlowState::AwaitingGrade { .. } => StateName::AwaitingGrade,
        }
    }

    /// Draft-text state for the given feedback kind
    pub fn awaiting_feedback(kind: FeedbackKind) -> Self {
        match kind {
            FeedbackKind::Complaint => FlowState::AwaitingComplaintText,
            FeedbackKind::Proposal => FlowState::AwaitingProposalText,
        }
    }

    pub fn confirming_feedback(kind: FeedbackKind, draft: String) -> Self {
        match kind {
            FeedbackKind::Complaint => FlowState::ConfirmingComplaint { draft },
            FeedbackKind::Proposal => FlowState::ConfirmingProposal { draft },
        }
    }

    /// The draft held by a confirmation step of the given kind
    pub fn feedback_draft(&self, kind: FeedbackKind) -> Option<&str> {
        match (self, kind) {
            (FlowState::ConfirmingComplaint { draft }, FeedbackKind::Complaint)
            | (FlowState::ConfirmingProposal { draft }, FeedbackKind::Proposal) => Some(draft),
            _ => None,
        }
    }
}

/// Fixed enumeration of flow-step identifiers as persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateName {
    AwaitingLanguage,
    AwaitingPhone,
    AwaitingFullName,
    AwaitingChildName,
    AwaitingChildClass,
    AwaitingComplaintText,
    ConfirmingComplaint,
    AwaitingProposalText,
    ConfirmingProposal,
    AwaitingClassName,
    AwaitingTeacherPhone,
    AwaitingTeacherName,
    AwaitingTeacherClasses,
    AwaitingTimetable,
    AwaitingAnnouncementText,
    ConfirmingAnnouncement,
    MarkingAttendance,
    AwaitingGrade,
}

impl StateName {
    pub const ALL: [StateName; 18] = [
        StateName::AwaitingLanguage,
        StateName::AwaitingPhone,
        StateName::AwaitingFullName,
        StateName::AwaitingChildName,
        StateName::AwaitingChildClass,
        StateName::AwaitingComplaintText,
        StateName::ConfirmingComplaint,
        StateName::AwaitingProposalText,
        StateName::ConfirmingProposal,
        StateName::AwaitingClassName,
        StateName::AwaitingTeacherPhone,
        StateName::AwaitingTeacherName,
        StateName::AwaitingTeacherClasses,
        StateName::AwaitingTimetable,
        StateName::AwaitingAnnouncementText,
        StateName::ConfirmingAnnouncement,
        StateName::MarkingAttendance,
        StateName::AwaitingGrade,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StateName::AwaitingLanguage => "awaiting_language",
            StateName::AwaitingPhone => "awaiting_phone",
            StateName::AwaitingFullName => "awaiting_full_name",
            StateName::AwaitingChildName => "awaiting_child_name",
            StateName::AwaitingChildClass => "awaiting_child_class",
            StateName::AwaitingComplaintText => "awaiting_complaint_text",
            StateName::ConfirmingComplaint => "confirming_complaint",
            StateName::AwaitingProposalText => "awaiting_proposal_text",
            StateName::ConfirmingProposal => "confirming_proposal",
            StateName::AwaitingClassName => "awaiting_class_name",
            StateName::AwaitingTeacherPhone => "awaiting_teacher_phone",
            StateName::AwaitingTeacherName => "awaiting_teacher_name",
            StateName::AwaitingTeacherClasses => "awaiting_teacher_classes",
            StateName::AwaitingTimetable => "awaiting_timetable",
            StateName::AwaitingAnnouncementText => "awaiting_announcement_text",
            StateName::ConfirmingAnnouncement => "confirming_announcement",
            StateName::MarkingAttendance => "marking_attendance",
            StateName::AwaitingGrade => "awaiting_grade",
        }
    }

    /// Role a user must hold for this step to make sense
    pub fn audience(self) -> Role {
        match self {
            StateName::AwaitingLanguage
            | StateName::AwaitingPhone
            | StateName::AwaitingFullName
            | StateName::AwaitingChildName
            | StateName::AwaitingChildClass => Role::Anonymous,
            StateName::AwaitingComplaintText
            | StateName::ConfirmingComplaint
            | StateName::AwaitingProposalText
            | StateName::ConfirmingProposal => Role::Parent,
            StateName::AwaitingClassName
            | StateName::AwaitingTeacherPhone
            | StateName::AwaitingTeacherName
            | StateName::AwaitingTeacherClasses
            | StateName::AwaitingTimetable
            | StateName::AwaitingAnnouncementText
            | StateName::ConfirmingAnnouncement => Role::Admin,
            StateName::MarkingAttendance | StateName::AwaitingGrade => Role::Teacher,
        }
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}
