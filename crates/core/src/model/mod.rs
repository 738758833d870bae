mod chat;
mod claim;
mod ids;
mod med_guarantee;
mod photo;
mod progress;
mod user;

pub use chat::{ChatError, ChatMessage, ChatRole, ChatText, NewChatMessage};
pub use claim::{
    Claim, ClaimDraft, ClaimValidationError, FieldError, TreatmentType, ValidatedClaim,
    parse_accident_date,
};
pub use ids::{ClaimId, GuaranteeId, MessageId, ParseIdError, PhotoId, UserId};
pub use med_guarantee::{MedGuaranteeDraft, MedGuaranteeRequest, ValidatedMedGuarantee};
pub use photo::{AccidentPhoto, PhotoDraft, PhotoError, ValidatedPhoto};
pub use progress::{
    CompletedTasks, Completion, Progress, ProgressError, Stage, TaskId, derive_stage,
};
pub use user::{LoginDraft, LoginError, User, UserIdentity, ValidatedLogin, normalize_phone};
