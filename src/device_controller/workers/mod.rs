pub mod device_thread;
pub mod reporting_thread;
