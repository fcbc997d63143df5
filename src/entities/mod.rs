pub mod prelude;

pub mod media_records;
