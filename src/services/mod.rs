pub mod auth;
pub mod format;
pub mod parse;
pub mod sync;

pub use auth::{AuthService, Claims};
pub use format::{ApiPayload, FormatService, PayloadSections};
pub use parse::{ExecutableRequest, FieldRow, HookRow, ParseService, RequestRows, ValidatorRow};
pub use sync::{SyncOutcome, SyncService};
