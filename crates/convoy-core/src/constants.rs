//! Constants shared by the gateway and the worker.

/// Multipart field carrying the uploaded video.
pub const UPLOAD_FIELD_NAME: &str = "mp4File";

/// Authorization scheme accepted by the gateway.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Topic the gateway publishes upload tasks to.
pub const DEFAULT_UPLOAD_TOPIC: &str = "upload";

/// Topic the worker publishes conversion results to.
pub const DEFAULT_RESULT_TOPIC: &str = "converted";

/// Handle prefix for uploaded source blobs.
pub const DEFAULT_SOURCE_PREFIX: &str = "videos";

/// Handle prefix for converted artifacts.
pub const DEFAULT_RESULT_PREFIX: &str = "mp3";

/// Slack added on top of the upload limit for multipart framing and headers.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;
