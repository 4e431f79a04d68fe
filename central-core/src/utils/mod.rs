pub mod periodic;

pub use periodic::spawn_periodic_task;
