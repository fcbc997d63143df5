pub use super::media_records::Entity as MediaRecords;
