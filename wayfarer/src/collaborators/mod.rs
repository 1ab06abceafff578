//! External systems the services call out to: a media host and a push dispatcher.

pub mod media;
pub mod push;

pub use media::{MediaError, MediaFolder, MediaStore, MediaUpload, MemoryMediaStore, UploadedImage, UploadedVideo};
pub use push::{
    LogPushDispatcher, MulticastReport, PushData, PushDispatcher, PushError, PushMessage, PushReceipt,
    RecordingPushDispatcher,
};
