//! # Engine Constants
//!
//! Well-known identifiers shared by the command registry, the messaging layer and the
//! school command set, plus the engine defaults `EngineConfig` falls back to.

/// Identifiers of the school command set, as registered in the command registry
pub mod commands {
    pub const COURSE_CREATE_OR_UPDATE: &str = "course.create.or.update";
    pub const COURSE_DELETE: &str = "course.delete";
    pub const COURSE_CREATE_BATCH: &str = "course.create.batch";

    pub const STUDENT_CREATE_OR_UPDATE: &str = "student.create.or.update";
    pub const STUDENT_DELETE: &str = "student.delete";
    pub const STUDENT_REGISTER_TO_COURSE: &str = "student.register.to.course";

    pub const GROUP_CREATE_OR_UPDATE: &str = "group.create.or.update";
    pub const GROUP_DELETE: &str = "group.delete";
    pub const GROUP_DELETE_BATCH: &str = "group.delete.batch";
}

/// Messaging layer identifiers
pub mod messaging {
    /// Correlation id of the sentinel that tells the processors to shut down
    pub const LAST_MESSAGE_CORRELATION_ID: &str = "__campus.last-message__";
    pub const LAST_MESSAGE_COMMAND_ID: &str = "__campus.shutdown__";

    pub const INPUT_PROCESSOR_NAME: &str = "command-input-processor";
    pub const OUTPUT_PROCESSOR_NAME: &str = "command-output-processor";
}

/// Defaults used when neither code nor environment override them
pub mod defaults {
    pub const WATCHDOG_TIMEOUT_MS: u64 = 1_000;
    pub const WATCHDOG_POLL_INTERVAL_MS: u64 = 5;
    pub const INPUT_QUEUE_CAPACITY: usize = 1_024;
    pub const PROCESSOR_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;
    pub const FALLBACK_PARALLELISM: usize = 4;

    pub const MAX_COURSES_PER_STUDENT: usize = 5;
    pub const COURSE_BATCH_SIZE: usize = 5;
    pub const GROUP_BATCH_SIZE: usize = 3;
}
