pub mod upload;

pub use upload::{extract_upload_file, UploadAccepted, UploadService, UploadedFile};
