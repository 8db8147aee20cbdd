pub mod configuration;
pub mod data_capture;
pub mod error_handling;
pub mod http_parser;
pub mod network;
pub mod observability;
pub mod sanitization;
pub mod session_management;
pub mod storage;
