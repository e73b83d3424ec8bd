pub mod admin;
pub mod documents;

pub use admin::AdminService;
pub use documents::{
    DocumentContent, DocumentService, ShareDocument, UpdateDocument, UploadDocument, UploadedFile,
};
