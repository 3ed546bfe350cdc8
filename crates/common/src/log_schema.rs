//! Field-name constants for structured log lines emitted by the engine.
//!
//! Every component logs through the `log` facade using these keys so a
//! host application's formatter (env_logger, tracing-log, …) renders
//! consistent fields across components, the same convention the teacher
//! codebase uses for its own command-tracing events.

pub const EVENT_TYPE: &str = "event_type";
pub const RULE: &str = "rule";
pub const PACKAGE: &str = "package";
pub const RUN_ID: &str = "run_id";
pub const COMMAND_ID: &str = "cmd_id";
pub const TIMESTAMP: &str = "ts";
pub const COMPONENT: &str = "component";
pub const EXIT_CODE: &str = "exit_code";
pub const DURATION_MS: &str = "duration_ms";
pub const FROM_VERSION: &str = "from_version";
pub const TO_VERSION: &str = "to_version";
