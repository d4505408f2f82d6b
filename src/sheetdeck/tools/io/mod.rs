pub mod csv_read;
pub mod http_fetch;
