pub mod database;
pub mod drive;
pub mod storage;
