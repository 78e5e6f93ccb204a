pub mod db;

pub use db::PgStore;
