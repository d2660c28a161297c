pub mod availability;
pub mod client_task;
pub mod episode_number_mapping;
pub mod job;
pub mod strm_mapping;
