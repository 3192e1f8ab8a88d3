pub mod db;
pub mod email;
pub mod export;
pub mod photos;

pub use db::DbAdapter;
pub use email::MailgunEmailAdapter;
pub use export::{CsvRenderer, PdfRenderer};
pub use photos::LocalPhotoStore;
