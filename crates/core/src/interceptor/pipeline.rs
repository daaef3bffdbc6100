//! Fixed stage lists per operation and phase.

use std::fmt;

/// Host operation being intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Insert of new rows.
    Create,
    /// Update of existing rows.
    Update,
    /// Removal of rows.
    Delete,
    /// Query.
    Read,
}

/// Point relative to the host's own persistence call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before the host runs the operation.
    Before,
    /// After the host produced results.
    After,
}

/// One named step of an interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Put parked read-only fields back (draft activation).
    RestoreReadonly,
    /// Check composition item counts.
    ValidateCounts,
    /// Generate missing UUID keys along attachment paths.
    AssignKeys,
    /// Derive and check media types of incoming content.
    ValidateMediaTypes,
    /// Stream new content to the store.
    UploadContent,
    /// Create, replace and remove content against the stored state.
    ApplyContentChanges,
    /// Park read-only fields (draft edit).
    StashReadonly,
    /// Queue removal of content owned by deleted rows.
    ScheduleContentDeletion,
    /// Add the columns content wrapping depends on.
    ExtendSelection,
    /// Replace content with lazy, scan-gated proxies.
    WrapContent,
}

impl Stage {
    /// Stable stage name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RestoreReadonly => "restore_readonly",
            Self::ValidateCounts => "validate_counts",
            Self::AssignKeys => "assign_keys",
            Self::ValidateMediaTypes => "validate_media_types",
            Self::UploadContent => "upload_content",
            Self::ApplyContentChanges => "apply_content_changes",
            Self::StashReadonly => "stash_readonly",
            Self::ScheduleContentDeletion => "schedule_content_deletion",
            Self::ExtendSelection => "extend_selection",
            Self::WrapContent => "wrap_content",
        }
    }

    /// Whether the stage only has work when the payload carries attachment data.
    #[must_use]
    pub const fn needs_content(self) -> bool {
        matches!(
            self,
            Self::AssignKeys
                | Self::ValidateMediaTypes
                | Self::UploadContent
                | Self::ApplyContentChanges
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const CREATE_BEFORE: &[Stage] = &[
    Stage::RestoreReadonly,
    Stage::ValidateCounts,
    Stage::AssignKeys,
    Stage::ValidateMediaTypes,
    Stage::UploadContent,
    Stage::StashReadonly,
];

const UPDATE_BEFORE: &[Stage] = &[
    Stage::RestoreReadonly,
    Stage::ValidateCounts,
    Stage::AssignKeys,
    Stage::ValidateMediaTypes,
    Stage::ApplyContentChanges,
    Stage::StashReadonly,
];

const DELETE_BEFORE: &[Stage] = &[Stage::ScheduleContentDeletion];

const READ_BEFORE: &[Stage] = &[Stage::ExtendSelection];

const READ_AFTER: &[Stage] = &[Stage::WrapContent];

/// Stages run for `operation` at `phase`, in order.
#[must_use]
pub const fn stages(operation: Operation, phase: Phase) -> &'static [Stage] {
    match (operation, phase) {
        (Operation::Create, Phase::Before) => CREATE_BEFORE,
        (Operation::Update, Phase::Before) => UPDATE_BEFORE,
        (Operation::Delete, Phase::Before) => DELETE_BEFORE,
        (Operation::Read, Phase::Before) => READ_BEFORE,
        (Operation::Read, Phase::After) => READ_AFTER,
        (Operation::Create | Operation::Update | Operation::Delete, Phase::After) => &[],
    }
}
