//! Inbound flow: upload sessions and the images that arrive while one is
//! open.

pub mod ingester;
pub mod session;

pub use ingester::{ImageIngester, IngestReport, ItemOutcome, extension_for_content_type};
pub use session::{
    Clock, ManualClock, SessionState, SessionTouch, SystemClock, UploadSession,
    UploadSessionManager,
};
